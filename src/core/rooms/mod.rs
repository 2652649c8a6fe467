// src/core/rooms/mod.rs

//! The room registry collaborator as seen from the connection core.
//!
//! The registry owns room creation, membership and game-start semantics and
//! its own synchronization; the dispatcher only forwards decoded requests.

pub mod memory;

use crate::core::protocol::{PlayerInfo, RoomSettings, SongInfo};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub use memory::InMemoryRegistry;

/// A single room, addressed by its non-zero id.
#[async_trait]
pub trait Room: Send + Sync {
    fn id(&self) -> u32;

    fn uses_password(&self) -> bool;

    /// Returns true if `player` was admitted.
    async fn join(&self, player: &PlayerInfo, password: &str) -> bool;

    async fn leave(&self, player: &PlayerInfo);

    /// Returns true if the selection was accepted. Accepting a selection ends
    /// any level still running, returning its players to the room.
    async fn set_selected_song(&self, player: &PlayerInfo, song: Option<SongInfo>) -> bool;

    /// Returns true if the level started. Every player seated in the room then
    /// moves into the game.
    async fn start_level(&self, player: &PlayerInfo, difficulty: u8, song: SongInfo) -> bool;

    async fn destroy(&self, player: &PlayerInfo);

    async fn transfer_host(&self, player: &PlayerInfo, new_host: PlayerInfo);

    async fn set_ready(&self, player: &PlayerInfo, ready: bool);

    /// Serialized room details, preceded by the song list when `include_songs` is set.
    async fn info(&self, include_songs: bool) -> Bytes;
}

#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// The serialized room listing sent in reply to `GetRooms`.
    async fn list_room_summaries(&self) -> Bytes;

    async fn rooms(&self) -> Vec<Arc<dyn Room>>;

    async fn room(&self, id: u32) -> Option<Arc<dyn Room>> {
        self.rooms().await.into_iter().find(|room| room.id() == id)
    }

    /// Creates a room owned by `owner` and returns its id.
    async fn create_room(&self, settings: RoomSettings, owner: PlayerInfo) -> u32;
}
