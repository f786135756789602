//! `tasklist`: a terminal to-do list with accounts.
//!
//! The task list is edited optimistically: every change shows up locally at
//! once and is rolled back if the task service rejects it.

pub mod app;
pub mod config;
pub mod controller;
pub mod forms;
pub mod identity;
pub mod optimistic;
pub mod remote;
pub mod service;
pub mod session;
pub mod ui;
