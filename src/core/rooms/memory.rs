// src/core/rooms/memory.rs

//! A minimal in-process room registry.
//!
//! It tracks settings, host and members so a standalone hub can serve clients.
//! Song selection and level starts are recorded and logged, nothing more.

use super::{Room, RoomRegistry};
use crate::core::protocol::{PlayerInfo, RoomSettings, SongInfo};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

fn put_string(dst: &mut BytesMut, s: &str) {
    dst.put_u32_le(s.len() as u32);
    dst.put_slice(s.as_bytes());
}

#[derive(Debug)]
struct Members {
    host: PlayerInfo,
    players: Vec<PlayerInfo>,
    ready: HashSet<u64>,
    selected_song: Option<SongInfo>,
}

#[derive(Debug)]
pub struct MemoryRoom {
    id: u32,
    settings: RoomSettings,
    members: Mutex<Members>,
    destroyed: AtomicBool,
}

impl MemoryRoom {
    fn new(id: u32, settings: RoomSettings, owner: PlayerInfo) -> Self {
        Self {
            id,
            settings,
            members: Mutex::new(Members {
                host: owner,
                players: Vec::new(),
                ready: HashSet::new(),
                selected_song: None,
            }),
            destroyed: AtomicBool::new(false),
        }
    }

    fn is_host(&self, player: &PlayerInfo) -> bool {
        self.members.lock().host.id == player.id
    }

    pub fn player_count(&self) -> usize {
        self.members.lock().players.len()
    }

    pub fn selected_song(&self) -> Option<SongInfo> {
        self.members.lock().selected_song.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn write_summary(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.id);
        put_string(dst, &self.settings.name);
        dst.put_u8(self.settings.use_password as u8);
        dst.put_u32_le(self.player_count() as u32);
        dst.put_u32_le(self.settings.max_players);
    }
}

#[async_trait]
impl Room for MemoryRoom {
    fn id(&self) -> u32 {
        self.id
    }

    fn uses_password(&self) -> bool {
        self.settings.use_password
    }

    async fn join(&self, player: &PlayerInfo, password: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if self.settings.use_password && self.settings.password != password {
            info!("{} used a wrong password for room {}", player.name, self.id);
            return false;
        }
        let mut members = self.members.lock();
        if members.players.iter().any(|p| p.id == player.id) {
            return true;
        }
        if self.settings.max_players > 0 && members.players.len() >= self.settings.max_players as usize
        {
            return false;
        }
        members.players.push(player.clone());
        true
    }

    async fn leave(&self, player: &PlayerInfo) {
        let mut members = self.members.lock();
        members.players.retain(|p| p.id != player.id);
        members.ready.remove(&player.id);
        if members.players.is_empty() {
            self.destroyed.store(true, Ordering::Release);
            debug!("Room {} is empty and was closed", self.id);
        } else if members.host.id == player.id {
            members.host = members.players[0].clone();
        }
    }

    async fn set_selected_song(&self, player: &PlayerInfo, song: Option<SongInfo>) -> bool {
        if !self.is_host(player) {
            return false;
        }
        let mut members = self.members.lock();
        members.selected_song = song;
        members.ready.clear();
        true
    }

    async fn start_level(&self, player: &PlayerInfo, difficulty: u8, song: SongInfo) -> bool {
        if self.is_destroyed() || !self.is_host(player) {
            return false;
        }
        info!(
            "Room {} starting '{}' (difficulty {}, {:.1}s)",
            self.id, song.name, difficulty, song.duration
        );
        self.members.lock().selected_song = Some(song);
        true
    }

    async fn destroy(&self, player: &PlayerInfo) {
        if self.is_host(player) {
            self.destroyed.store(true, Ordering::Release);
        }
    }

    async fn transfer_host(&self, player: &PlayerInfo, new_host: PlayerInfo) {
        let mut members = self.members.lock();
        if members.host.id == player.id && members.players.iter().any(|p| p.id == new_host.id) {
            members.host = new_host;
        }
    }

    async fn set_ready(&self, player: &PlayerInfo, ready: bool) {
        let mut members = self.members.lock();
        if ready {
            members.ready.insert(player.id);
        } else {
            members.ready.remove(&player.id);
        }
    }

    async fn info(&self, include_songs: bool) -> Bytes {
        let members = self.members.lock();
        let mut buf = BytesMut::new();
        if include_songs {
            match &members.selected_song {
                Some(song) => {
                    buf.put_u32_le(1);
                    buf.put_slice(&song.encode());
                }
                None => buf.put_u32_le(0),
            }
        }
        buf.put_u32_le(self.id);
        put_string(&mut buf, &self.settings.name);
        buf.put_u8(self.settings.use_password as u8);
        buf.put_u32_le(self.settings.max_players);
        buf.put_slice(&members.host.encode());
        buf.put_u32_le(members.players.len() as u32);
        for player in &members.players {
            buf.put_slice(&player.encode());
            buf.put_u8(members.ready.contains(&player.id) as u8);
        }
        buf.freeze()
    }
}

/// A `DashMap`-backed registry with sequential room ids starting at 1.
#[derive(Debug)]
pub struct InMemoryRegistry {
    rooms: DashMap<u32, Arc<MemoryRoom>>,
    next_id: AtomicU32,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    fn prune(&self) {
        self.rooms.retain(|_, room| !room.is_destroyed());
    }

    pub fn get(&self, id: u32) -> Option<Arc<MemoryRoom>> {
        self.rooms.get(&id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRegistry {
    async fn list_room_summaries(&self) -> Bytes {
        self.prune();
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.rooms.len() as u32);
        for entry in self.rooms.iter() {
            entry.value().write_summary(&mut buf);
        }
        buf.freeze()
    }

    async fn rooms(&self) -> Vec<Arc<dyn Room>> {
        self.prune();
        self.rooms
            .iter()
            .map(|entry| entry.value().clone() as Arc<dyn Room>)
            .collect()
    }

    async fn room(&self, id: u32) -> Option<Arc<dyn Room>> {
        self.get(id)
            .filter(|room| !room.is_destroyed())
            .map(|room| room as Arc<dyn Room>)
    }

    async fn create_room(&self, settings: RoomSettings, owner: PlayerInfo) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!("{} created room {} '{}'", owner.name, id, settings.name);
        self.rooms
            .insert(id, Arc::new(MemoryRoom::new(id, settings, owner)));
        id
    }
}
