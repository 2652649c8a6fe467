// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: handshake, admission,
//! command dispatch and teardown.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::{ClientSession, Control, SessionState};
