//! Development backend for `tasklist`.
//!
//! Exposes the server for use in tests and embedding. The server accepts
//! WebSocket connections, keeps a signed-in identity per connection and
//! answers task and identity calls against in-memory stores.

pub mod accounts;
pub mod config;
pub mod documents;
pub mod server;
