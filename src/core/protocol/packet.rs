// src/core/protocol/packet.rs

//! Defines the command tags and the decoded `Packet` unit exchanged with clients.

use bytes::{BufMut, Bytes, BytesMut};
use strum_macros::{Display, FromRepr};

/// The one-byte command tag at the start of every payload.
///
/// The numeric values are shared with every client build and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum CommandType {
    Connect = 0,
    Disconnect = 1,
    GetRooms = 2,
    CreateRoom = 3,
    JoinRoom = 4,
    GetRoomInfo = 5,
    LeaveRoom = 6,
    DestroyRoom = 7,
    TransferHost = 8,
    SetSelectedSong = 9,
    StartLevel = 10,
    UpdatePlayerInfo = 11,
    PlayerReady = 12,
}

/// One decoded protocol message: the raw tag byte and the bytes that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub tag: u8,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(command: CommandType, payload: impl Into<Bytes>) -> Self {
        Self {
            tag: command as u8,
            payload: payload.into(),
        }
    }

    /// A packet with no payload, used for acknowledgements.
    pub fn empty(command: CommandType) -> Self {
        Self::new(command, Bytes::new())
    }

    /// Builds a `Disconnect` notice carrying a length-prefixed UTF-8 reason.
    pub fn disconnect_with_reason(reason: &str) -> Self {
        let mut buf = BytesMut::with_capacity(4 + reason.len());
        buf.put_u32_le(reason.len() as u32);
        buf.put_slice(reason.as_bytes());
        Self::new(CommandType::Disconnect, buf.freeze())
    }

    /// Resolves the tag to a known command. Unknown tags map to `None`.
    pub fn command(&self) -> Option<CommandType> {
        CommandType::from_repr(self.tag)
    }

    /// The number of bytes this packet occupies on the wire, length prefix included.
    pub fn wire_len(&self) -> usize {
        4 + 1 + self.payload.len()
    }
}
