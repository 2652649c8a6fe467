// src/core/handler/mod.rs

//! Command handling for admitted connections.

pub mod dispatcher;

pub use dispatcher::{DispatchOutcome, Dispatcher};
