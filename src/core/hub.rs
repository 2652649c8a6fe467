// src/core/hub.rs

//! The hub task: the single consumer of `HubEvent`s.
//!
//! Room membership only changes here, so a join and the disconnect that
//! follows it are always applied in publication order.

use crate::connection::ClientSession;
use crate::core::events::HubEvent;
use crate::core::state::HubState;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

pub struct Hub {
    state: Arc<HubState>,
    events: mpsc::UnboundedReceiver<HubEvent>,
}

impl Hub {
    pub fn new(state: Arc<HubState>, events: mpsc::UnboundedReceiver<HubEvent>) -> Self {
        Self { state, events }
    }

    /// Runs the main loop for the hub until shutdown or until every sender is gone.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!("Hub event loop started.");
        loop {
            tokio::select! {
                maybe_event = self.events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle(event).await,
                        None => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Hub shutting down.");
                    break;
                }
            }
        }
    }

    /// Applies a single event.
    pub async fn handle(&self, event: HubEvent) {
        match event {
            HubEvent::ClientJoinedRoom {
                session,
                room_id,
                password,
                generation,
            } => self.join(&session, room_id, &password, generation).await,
            HubEvent::ClientLeftRoom { session } => {
                let room_id = session.return_to_lobby();
                self.leave(&session, room_id).await;
            }
            HubEvent::ClientDisconnected { session, room_id } => {
                self.leave(&session, room_id).await;
                debug!("Session {} released by the hub.", session.id());
            }
        }
    }

    async fn join(
        &self,
        session: &Arc<ClientSession>,
        room_id: u32,
        password: &str,
        generation: u64,
    ) {
        if !session.is_active() {
            return;
        }
        if session.membership_generation() != generation {
            debug!(
                "{} sent a newer membership request; skipping join of room {}",
                session.name(),
                room_id
            );
            return;
        }
        let Some(room) = self.state.rooms.room(room_id).await else {
            debug!("{} asked for unknown room {}", session.name(), room_id);
            return;
        };

        let current = session.joined_room_id();
        if current == room_id {
            return;
        }
        if current != 0 {
            session.return_to_lobby();
            self.leave(session, current).await;
        }

        if !room.join(&session.identity(), password).await {
            debug!("Room {} refused {}", room_id, session.name());
            return;
        }
        if session.enter_room_if_current(room_id, generation) {
            info!("{} joined room {}", session.name(), room_id);
        } else {
            // Disconnected or superseded while the room was deciding.
            room.leave(&session.identity()).await;
        }
    }

    async fn leave(&self, session: &Arc<ClientSession>, room_id: u32) {
        if room_id == 0 {
            return;
        }
        if let Some(room) = self.state.rooms.room(room_id).await {
            room.leave(&session.identity()).await;
            debug!("{} left room {}", session.name(), room_id);
        }
    }
}
