// src/core/state/core.rs

//! Defines the central `HubState` struct, holding all shared hub-wide state.

use super::client::ClientMap;
use super::stats::StatsState;
use crate::config::Config;
use crate::core::HubError;
use crate::core::access::AccessControl;
use crate::core::events::{EventBus, HubEvent};
use crate::core::handshake;
use crate::core::rooms::RoomRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Everything produced by `HubState::initialize` that the spawner consumes.
pub struct HubInit {
    /// The fully initialized, shared hub state.
    pub state: Arc<HubState>,
    /// Receives lifecycle and room events for the hub task.
    pub event_rx: mpsc::UnboundedReceiver<HubEvent>,
}

/// The state shared by every connection task, the liveness monitor and the hub.
pub struct HubState {
    /// The configuration the hub was started with.
    pub config: Config,
    /// The protocol version clients are compared against.
    pub protocol_version: u32,
    /// Block and allow lists consulted during the handshake.
    pub access: AccessControl,
    /// All admitted clients, keyed by session id. The liveness monitor sweeps this map.
    pub clients: ClientMap,
    /// The external room registry.
    pub rooms: Arc<dyn RoomRegistry>,
    /// Publishes lifecycle events to the hub.
    pub events: EventBus,
    /// Hub-wide traffic and connection counters.
    pub stats: Arc<StatsState>,
    next_session_id: AtomicU64,
}

impl std::fmt::Debug for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubState")
            .field("protocol_version", &self.protocol_version)
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl HubState {
    /// Builds the shared state from the configuration and a room registry.
    pub fn initialize(
        config: Config,
        rooms: Arc<dyn RoomRegistry>,
    ) -> Result<HubInit, HubError> {
        let protocol_version = match config.protocol_version {
            Some(version) => version,
            None => handshake::server_protocol_version(env!("CARGO_PKG_VERSION")).ok_or_else(
                || {
                    HubError::Internal(format!(
                        "cannot derive a protocol version from '{}'",
                        env!("CARGO_PKG_VERSION")
                    ))
                },
            )?,
        };
        info!("Protocol version: {}", protocol_version);

        let (events, event_rx) = EventBus::new();
        let state = Arc::new(Self {
            access: AccessControl::new(&config.access),
            config,
            protocol_version,
            clients: Arc::new(DashMap::new()),
            rooms,
            events,
            stats: Arc::new(StatsState::new()),
            next_session_id: AtomicU64::new(1),
        });

        Ok(HubInit { state, event_rx })
    }

    /// Hands out a fresh, never reused session id.
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Moves every player seated in `room_id` into its game.
    pub fn start_game(&self, room_id: u32) {
        let moved = self
            .clients
            .iter()
            .filter(|entry| entry.value().enter_game(room_id))
            .count();
        debug!("Room {} started a level with {} players", room_id, moved);
    }

    /// Moves every player of `room_id`'s game back into the room.
    pub fn end_game(&self, room_id: u32) {
        let moved = self
            .clients
            .iter()
            .filter(|entry| entry.value().leave_game(room_id))
            .count();
        if moved > 0 {
            debug!("Room {} returned {} players from its game", room_id, moved);
        }
    }
}
