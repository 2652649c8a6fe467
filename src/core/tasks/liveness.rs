// src/core/tasks/liveness.rs

use crate::connection::ClientSession;
use crate::core::state::HubState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A task that sweeps all admitted clients on a shared tick, tearing down dead
/// transports and kicking players idle inside a room or game.
///
/// Idling in the lobby never times out.
pub struct LivenessMonitor {
    state: Arc<HubState>,
    tick: Duration,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(state: Arc<HubState>) -> Self {
        let tick = state.config.liveness_tick;
        let timeout = state.config.inactivity_timeout;
        Self {
            state,
            tick,
            timeout,
        }
    }

    /// Runs the main loop for the liveness monitor.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Liveness monitor started (tick {:?}, inactivity timeout {:?}).",
            self.tick, self.timeout
        );
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep(Instant::now());
                }
                _ = shutdown_rx.recv() => {
                    info!("Liveness monitor shutting down.");
                    return;
                }
            }
        }
    }

    /// Performs one sweep over every registered client as of `now`.
    pub fn sweep(&self, now: Instant) {
        // Snapshot first: teardown removes entries from the map.
        let sessions: Vec<Arc<ClientSession>> = self
            .state
            .clients
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for session in sessions {
            if !session.is_connected() {
                debug!("Session {} lost its transport.", session.id());
                session.teardown();
                continue;
            }

            if session.state().is_in_room_or_game() {
                session.start_idle_timer(now);
            } else {
                session.reset_idle_timer();
            }

            if session.idle_for(now) > self.timeout {
                info!("Kicked {} for inactivity", session.name());
                session.kick(None);
            }
        }
    }
}
