// src/core/protocol/payload.rs

//! Byte-level decoding of the domain records carried inside command payloads.
//!
//! Only the fields this core needs are decoded; anything after them is kept
//! as opaque bytes so records can be forwarded to room collaborators unchanged.

use crate::core::HubError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A bounds-checked cursor over a payload.
///
/// Every accessor fails with `MalformedPayload` instead of panicking on short input.
#[derive(Debug)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize, what: &str) -> Result<(), HubError> {
        if self.buf.remaining() < needed {
            return Err(HubError::MalformedPayload(format!(
                "expected {needed} bytes for {what}, found {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, HubError> {
        self.ensure(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u32(&mut self) -> Result<u32, HubError> {
        self.ensure(4, "u32")?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_u64(&mut self) -> Result<u64, HubError> {
        self.ensure(8, "u64")?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_f32(&mut self) -> Result<f32, HubError> {
        self.ensure(4, "f32")?;
        Ok(self.buf.get_f32_le())
    }

    /// Reads a `[u32 length][UTF-8 bytes]` string.
    pub fn read_string(&mut self) -> Result<String, HubError> {
        let len = self.read_u32()? as usize;
        self.ensure(len, "string body")?;
        let raw = self.buf.split_to(len);
        Ok(String::from_utf8(raw.to_vec())?)
    }

    /// Takes every byte not consumed yet.
    pub fn rest(&mut self) -> Bytes {
        self.buf.split_to(self.buf.remaining())
    }
}

fn put_string(dst: &mut BytesMut, s: &str) {
    dst.put_u32_le(s.len() as u32);
    dst.put_slice(s.as_bytes());
}

/// A player's identity as announced by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub name: String,
    pub id: u64,
    /// Client-defined trailing fields (score, avatar, ...), forwarded untouched.
    pub extra: Bytes,
}

impl PlayerInfo {
    pub fn decode(payload: Bytes) -> Result<Self, HubError> {
        let mut reader = PayloadReader::new(payload);
        let name = reader.read_string()?;
        let id = reader.read_u64()?;
        Ok(Self {
            name,
            id,
            extra: reader.rest(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12 + self.name.len() + self.extra.len());
        put_string(&mut buf, &self.name);
        buf.put_u64_le(self.id);
        buf.put_slice(&self.extra);
        buf.freeze()
    }
}

/// Settings supplied by a client creating a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSettings {
    pub name: String,
    pub use_password: bool,
    pub password: String,
    pub max_players: u32,
    pub extra: Bytes,
}

impl RoomSettings {
    pub fn decode(payload: Bytes) -> Result<Self, HubError> {
        let mut reader = PayloadReader::new(payload);
        let name = reader.read_string()?;
        let use_password = reader.read_u8()? != 0;
        let password = reader.read_string()?;
        let max_players = reader.read_u32()?;
        Ok(Self {
            name,
            use_password,
            password,
            max_players,
            extra: reader.rest(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_string(&mut buf, &self.name);
        buf.put_u8(self.use_password as u8);
        put_string(&mut buf, &self.password);
        buf.put_u32_le(self.max_players);
        buf.put_slice(&self.extra);
        buf.freeze()
    }
}

/// A song descriptor as selected or started by a room host.
#[derive(Debug, Clone, PartialEq)]
pub struct SongInfo {
    pub name: String,
    pub level_id: String,
    /// Song length in seconds.
    pub duration: f32,
}

impl SongInfo {
    pub fn decode(payload: Bytes) -> Result<Self, HubError> {
        let mut reader = PayloadReader::new(payload);
        Ok(Self {
            name: reader.read_string()?,
            level_id: reader.read_string()?,
            duration: reader.read_f32()?,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12 + self.name.len() + self.level_id.len());
        put_string(&mut buf, &self.name);
        put_string(&mut buf, &self.level_id);
        buf.put_f32_le(self.duration);
        buf.freeze()
    }
}
