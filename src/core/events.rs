// src/core/events.rs

//! Defines the typed events the connection core publishes to the hub.
//!
//! Lifecycle and room-membership notifications travel over a single channel,
//! so the hub observes them in the order they were produced.

use crate::connection::ClientSession;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// A notification from a connection to the hub.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// The client was torn down. `room_id` is the room it was in, or 0.
    ClientDisconnected {
        session: Arc<ClientSession>,
        room_id: u32,
    },
    /// The client asked to join a room. Membership is only granted by the hub.
    ClientJoinedRoom {
        session: Arc<ClientSession>,
        room_id: u32,
        password: String,
        /// The session's membership generation when the request was read.
        generation: u64,
    },
    /// The client asked to go back to the lobby from whatever room the hub
    /// has placed it in.
    ClientLeftRoom { session: Arc<ClientSession> },
}

/// The sending half of the hub event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<HubEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` and returns the receiver for the hub task.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HubEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: HubEvent) {
        if self.sender.send(event).is_err() {
            debug!("Published a hub event with no active receiver.");
        }
    }
}
