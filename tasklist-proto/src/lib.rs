//! Shared data model and wire protocol for `tasklist`.

pub mod codec;
pub mod identity;
pub mod task;
pub mod wire;
