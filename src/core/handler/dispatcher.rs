// src/core/handler/dispatcher.rs

//! Routes a decoded packet from an admitted client to its handler.

use crate::connection::ClientSession;
use crate::core::HubError;
use crate::core::events::HubEvent;
use crate::core::protocol::{
    CommandType, Packet, PayloadReader, PlayerInfo, RoomSettings, SongInfo,
};
use crate::core::rooms::Room;
use crate::core::state::HubState;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span, warn};

/// Extra time granted on top of a song's duration when a level starts.
pub const LEVEL_START_GRACE: f32 = 2.5;

/// What the connection loop should do after a packet was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Continue,
    Reply(Packet),
    Disconnect,
}

/// Dispatches packets for one session against the shared hub state.
pub struct Dispatcher<'a> {
    session: &'a Arc<ClientSession>,
    state: &'a HubState,
}

impl<'a> Dispatcher<'a> {
    pub fn new(session: &'a Arc<ClientSession>, state: &'a HubState) -> Self {
        Self { session, state }
    }

    /// Handles one packet. Malformed payloads are logged and dropped; they never
    /// end the connection.
    pub async fn dispatch(&self, packet: Packet) -> DispatchOutcome {
        let Some(command) = packet.command() else {
            debug!(
                "Session {}: ignoring unknown command tag {}",
                self.session.id(),
                packet.tag
            );
            return DispatchOutcome::Continue;
        };

        if command != CommandType::UpdatePlayerInfo {
            debug!(
                "Session {}: received {} ({} bytes)",
                self.session.id(),
                command,
                packet.payload.len()
            );
        }

        let span = debug_span!("dispatch", command = %command, client = self.session.id());
        match self.route(command, packet.payload).instrument(span).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Dropped {} from {}: {}",
                    command,
                    self.session.name(),
                    e
                );
                DispatchOutcome::Continue
            }
        }
    }

    async fn route(
        &self,
        command: CommandType,
        payload: Bytes,
    ) -> Result<DispatchOutcome, HubError> {
        match command {
            CommandType::Connect => Ok(Self::keepalive(&payload)),
            CommandType::Disconnect => Ok(DispatchOutcome::Disconnect),
            CommandType::UpdatePlayerInfo => self.update_player_info(payload),
            CommandType::JoinRoom => self.join_room(payload).await,
            CommandType::LeaveRoom => Ok(self.leave_room()),
            CommandType::GetRooms => {
                let listing = self.state.rooms.list_room_summaries().await;
                Ok(DispatchOutcome::Reply(Packet::new(CommandType::GetRooms, listing)))
            }
            CommandType::CreateRoom => self.create_room(payload).await,
            CommandType::GetRoomInfo => self.get_room_info(payload).await,
            CommandType::SetSelectedSong => self.set_selected_song(payload).await,
            CommandType::StartLevel => self.start_level(payload).await,
            CommandType::DestroyRoom => {
                if let Some(room) = self.joined_room().await {
                    room.destroy(&self.session.identity()).await;
                }
                Ok(DispatchOutcome::Continue)
            }
            CommandType::TransferHost => self.transfer_host(payload).await,
            CommandType::PlayerReady => self.player_ready(payload).await,
        }
    }

    /// The room this session is in, if any and if the registry still knows it.
    async fn joined_room(&self) -> Option<Arc<dyn Room>> {
        match self.session.joined_room_id() {
            0 => None,
            id => self.state.rooms.room(id).await,
        }
    }

    /// An empty or all-zero payload on a post-handshake Connect is an implicit disconnect.
    fn keepalive(payload: &Bytes) -> DispatchOutcome {
        if payload.iter().all(|&b| b == 0) {
            DispatchOutcome::Disconnect
        } else {
            DispatchOutcome::Continue
        }
    }

    fn update_player_info(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let identity = PlayerInfo::decode(payload)?;
        self.session.replace_identity(identity);
        self.session.restart_idle_timer(Instant::now());
        Ok(DispatchOutcome::Continue)
    }

    async fn join_room(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let mut reader = PayloadReader::new(payload);
        let room_id = reader.read_u32()?;

        let uses_password = match self.state.rooms.room(room_id).await {
            Some(room) => room.uses_password(),
            None => false,
        };
        let password = if uses_password {
            reader.read_string()?
        } else {
            String::new()
        };

        let generation = self.session.request_membership_change();
        self.state.events.publish(HubEvent::ClientJoinedRoom {
            session: self.session.clone(),
            room_id,
            password,
            generation,
        });
        Ok(DispatchOutcome::Continue)
    }

    fn leave_room(&self) -> DispatchOutcome {
        self.session.request_membership_change();
        self.state.events.publish(HubEvent::ClientLeftRoom {
            session: self.session.clone(),
        });
        DispatchOutcome::Continue
    }

    async fn create_room(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let settings = RoomSettings::decode(payload)?;
        let room_id = self
            .state
            .rooms
            .create_room(settings, self.session.identity())
            .await;
        let reply = Packet::new(CommandType::CreateRoom, room_id.to_le_bytes().to_vec());
        Ok(DispatchOutcome::Reply(reply))
    }

    async fn get_room_info(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let Some(room) = self.joined_room().await else {
            return Ok(DispatchOutcome::Continue);
        };
        let include_songs = payload.is_empty() || payload[..] == [1];

        let info = room.info(include_songs).await;
        let mut buf = BytesMut::with_capacity(1 + info.len());
        buf.put_u8(include_songs as u8);
        buf.put_slice(&info);
        Ok(DispatchOutcome::Reply(Packet::new(
            CommandType::GetRoomInfo,
            buf.freeze(),
        )))
    }

    async fn set_selected_song(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let Some(room) = self.joined_room().await else {
            return Ok(DispatchOutcome::Continue);
        };
        let song = if payload.is_empty() {
            None
        } else {
            Some(SongInfo::decode(payload)?)
        };
        if room.set_selected_song(&self.session.identity(), song).await {
            self.state.end_game(room.id());
        }
        Ok(DispatchOutcome::Continue)
    }

    async fn start_level(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let Some(room) = self.joined_room().await else {
            return Ok(DispatchOutcome::Continue);
        };
        let mut reader = PayloadReader::new(payload);
        let difficulty = reader.read_u8()?;
        let mut song = SongInfo::decode(reader.rest())?;
        song.duration += LEVEL_START_GRACE;
        if room
            .start_level(&self.session.identity(), difficulty, song)
            .await
        {
            self.state.start_game(room.id());
        }
        Ok(DispatchOutcome::Continue)
    }

    async fn transfer_host(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let Some(room) = self.joined_room().await else {
            return Ok(DispatchOutcome::Continue);
        };
        let new_host = PlayerInfo::decode(payload)?;
        room.transfer_host(&self.session.identity(), new_host)
            .await;
        Ok(DispatchOutcome::Continue)
    }

    async fn player_ready(&self, payload: Bytes) -> Result<DispatchOutcome, HubError> {
        let Some(room) = self.joined_room().await else {
            return Ok(DispatchOutcome::Continue);
        };
        let ready = PayloadReader::new(payload).read_u8()? != 0;
        room.set_ready(&self.session.identity(), ready).await;
        Ok(DispatchOutcome::Continue)
    }
}
