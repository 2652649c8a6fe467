// src/core/mod.rs

//! The central module containing the protocol engine of the hub.

pub mod access;
pub mod errors;
pub mod events;
pub mod handler;
pub mod handshake;
pub mod hub;
pub mod protocol;
pub mod rooms;
pub mod state;
pub mod tasks;

pub use errors::HubError;
pub use protocol::{CommandType, Packet};
