// src/core/protocol/mod.rs

pub mod codec;
pub mod packet;
pub mod payload;

pub use codec::{PacketCodec, send_within};
pub use packet::{CommandType, Packet};
pub use payload::{PayloadReader, PlayerInfo, RoomSettings, SongInfo};
