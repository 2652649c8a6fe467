// src/core/state/mod.rs

//! Defines the central `HubState` struct and its components.

mod client;
mod core;
mod stats;

pub use client::ClientMap;
pub use core::{HubInit, HubState};
pub use stats::StatsState;
