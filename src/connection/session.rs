// src/connection/session.rs

//! Defines the per-player session shared between a connection task, the
//! liveness monitor and the hub.

use crate::core::events::HubEvent;
use crate::core::protocol::PlayerInfo;
use crate::core::state::HubState;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

/// A connection's coarse lifecycle phase.
///
/// The joined room id lives inside the non-lobby variants, so a session in the
/// lobby can never carry a room id and a session in a room always has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Lobby,
    InRoom(u32),
    InGame(u32),
}

impl SessionState {
    /// The joined room id, or 0 in the lobby.
    pub fn joined_room_id(&self) -> u32 {
        match self {
            SessionState::Lobby => 0,
            SessionState::InRoom(id) | SessionState::InGame(id) => *id,
        }
    }

    pub fn is_in_room_or_game(&self) -> bool {
        !matches!(self, SessionState::Lobby)
    }
}

/// The session state plus the generation of the latest membership request.
///
/// Every `JoinRoom` or `LeaveRoom` the client sends bumps the generation, so
/// the hub can tell when a join it is applying was superseded.
#[derive(Debug, Default)]
struct Membership {
    state: SessionState,
    generation: u64,
}

/// Requests delivered to the task that owns the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Send a disconnect notice (with an optional reason), then tear down.
    Kick(Option<String>),
    /// Teardown already happened elsewhere; close the transport.
    Close,
}

/// An admitted player.
pub struct ClientSession {
    id: u64,
    addr: SocketAddr,
    identity: RwLock<PlayerInfo>,
    membership: Mutex<Membership>,
    /// Start of the current inactivity stopwatch run. `None` while stopped.
    idle_since: Mutex<Option<Instant>>,
    active: AtomicBool,
    kick_requested: AtomicBool,
    control_tx: mpsc::UnboundedSender<Control>,
    hub: Arc<HubState>,
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("name", &self.identity.read().name)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish()
    }
}

impl ClientSession {
    /// Creates an inactive session in the lobby.
    pub fn new(
        id: u64,
        addr: SocketAddr,
        identity: PlayerInfo,
        control_tx: mpsc::UnboundedSender<Control>,
        hub: Arc<HubState>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            addr,
            identity: RwLock::new(identity),
            membership: Mutex::new(Membership::default()),
            idle_since: Mutex::new(None),
            active: AtomicBool::new(false),
            kick_requested: AtomicBool::new(false),
            control_tx,
            hub,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A snapshot of the current identity.
    pub fn identity(&self) -> PlayerInfo {
        self.identity.read().clone()
    }

    pub fn name(&self) -> String {
        self.identity.read().name.clone()
    }

    /// Replaces the identity wholesale.
    pub fn replace_identity(&self, identity: PlayerInfo) {
        *self.identity.write() = identity;
    }

    pub fn state(&self) -> SessionState {
        self.membership.lock().state
    }

    pub fn joined_room_id(&self) -> u32 {
        self.state().joined_room_id()
    }

    /// Records a new join or leave request and returns its generation.
    pub fn request_membership_change(&self) -> u64 {
        let mut membership = self.membership.lock();
        membership.generation += 1;
        membership.generation
    }

    /// The generation of the latest join or leave request.
    pub fn membership_generation(&self) -> u64 {
        self.membership.lock().generation
    }

    /// Places the player in `room_id` unconditionally.
    pub fn enter_room(&self, room_id: u32) {
        debug_assert!(room_id != 0, "room ids are non-zero");
        self.membership.lock().state = SessionState::InRoom(room_id);
    }

    /// Places the player in `room_id` unless the session was torn down or the
    /// client sent another join or leave after request `generation`.
    ///
    /// Returns false when the room admission must be rolled back.
    pub fn enter_room_if_current(&self, room_id: u32, generation: u64) -> bool {
        let mut membership = self.membership.lock();
        if !self.is_active() || membership.generation != generation {
            return false;
        }
        membership.state = SessionState::InRoom(room_id);
        true
    }

    /// Moves a player in `room_id` into that room's game. Returns true if it moved.
    pub fn enter_game(&self, room_id: u32) -> bool {
        let mut membership = self.membership.lock();
        if membership.state == SessionState::InRoom(room_id) {
            membership.state = SessionState::InGame(room_id);
            return true;
        }
        false
    }

    /// Moves a player in `room_id`'s game back to the room. Returns true if it moved.
    pub fn leave_game(&self, room_id: u32) -> bool {
        let mut membership = self.membership.lock();
        if membership.state == SessionState::InGame(room_id) {
            membership.state = SessionState::InRoom(room_id);
            return true;
        }
        false
    }

    /// Returns to the lobby and reports the room that was left, or 0.
    pub fn return_to_lobby(&self) -> u32 {
        let mut membership = self.membership.lock();
        let previous = membership.state.joined_room_id();
        membership.state = SessionState::Lobby;
        previous
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// True while the task owning the transport is still running.
    pub fn is_connected(&self) -> bool {
        !self.control_tx.is_closed()
    }

    // --- Inactivity stopwatch ---

    /// Starts the stopwatch if it is not already running.
    pub fn start_idle_timer(&self, now: Instant) {
        self.idle_since.lock().get_or_insert(now);
    }

    /// Stops the stopwatch and zeroes it.
    pub fn reset_idle_timer(&self) {
        *self.idle_since.lock() = None;
    }

    /// Zeroes the stopwatch and keeps it running.
    pub fn restart_idle_timer(&self, now: Instant) {
        *self.idle_since.lock() = Some(now);
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        self.idle_since
            .lock()
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    // --- Lifecycle ---

    /// Marks the session admitted and registers it with the liveness sweep.
    pub(crate) fn activate(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hub.clients.insert(self.id, self.clone());
        self.hub.stats.client_admitted();
    }

    /// Asks the connection task to send a disconnect notice and tear down.
    ///
    /// Repeated kicks while the first is in flight are ignored. If the task is
    /// already gone the session is torn down directly.
    pub fn kick(self: &Arc<Self>, reason: Option<String>) {
        if !self.is_active() || self.kick_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hub.stats.increment_kicked();
        if self.control_tx.send(Control::Kick(reason)).is_err() {
            self.teardown();
        }
    }

    /// Idempotent teardown. Returns true only for the call that performed it.
    ///
    /// Unregisters from the liveness sweep, asks the owning task to close the
    /// transport and publishes exactly one `ClientDisconnected` event.
    pub fn teardown(self: &Arc<Self>) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!("{} disconnected!", self.name());

        self.hub.clients.remove(&self.id);
        self.hub.stats.client_removed();
        let _ = self.control_tx.send(Control::Close);

        let room_id = self.joined_room_id();
        self.hub.events.publish(HubEvent::ClientDisconnected {
            session: self.clone(),
            room_id,
        });
        true
    }
}
