// src/core/protocol/codec.rs

//! Implements the length-prefixed frame format as a `tokio_util::codec`
//! `Encoder` and `Decoder`.
//!
//! ```text
//! +-------------------+---------+---------------------+
//! | length (4 bytes)  | tag (1) | payload (length-1)  |
//! | u32 little-endian |         |                     |
//! +-------------------+---------+---------------------+
//! ```
//!
//! Short reads never lose progress: bytes stay in the framed read buffer until
//! a whole frame is present, so a frame split over any number of transport
//! reads decodes to exactly one `Packet`.

use super::packet::Packet;
use crate::core::HubError;
use crate::core::state::StatsState;
use bytes::{Buf, BufMut, BytesMut};
use futures::SinkExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::codec::{Decoder, Encoder, Framed};

const LENGTH_PREFIX_LEN: usize = 4;

/// Largest single growth of the read buffer while a frame is incomplete.
const READ_CHUNK: usize = 64 * 1024;

/// Codec for the hub's wire protocol.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    /// Optional cap on the declared frame length. `None` accepts any size.
    max_frame_size: Option<u32>,
    stats: Arc<StatsState>,
}

impl PacketCodec {
    pub fn new(max_frame_size: Option<u32>, stats: Arc<StatsState>) -> Self {
        Self {
            max_frame_size,
            stats,
        }
    }

    /// A codec with no frame size cap and a private set of counters.
    pub fn unbounded() -> Self {
        Self::new(None, Arc::new(StatsState::new()))
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = HubError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let declared = u32::from_le_bytes(prefix);

        if let Some(max) = self.max_frame_size
            && declared > max
        {
            return Err(HubError::FrameTooLarge {
                size: declared,
                max,
            });
        }
        if declared == 0 {
            return Err(HubError::EmptyFrame);
        }

        let frame_len = LENGTH_PREFIX_LEN + declared as usize;
        if src.len() < frame_len {
            // Grow towards the declared length at most one chunk per call.
            src.reserve((frame_len - src.len()).min(READ_CHUNK));
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let body = src.split_to(declared as usize).freeze();
        self.stats.record_bytes_in(frame_len as u64);

        Ok(Some(Packet {
            tag: body[0],
            payload: body.slice(1..),
        }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = HubError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body_len = 1 + item.payload.len();
        let declared = u32::try_from(body_len)
            .map_err(|_| HubError::Internal(format!("outgoing frame too large: {body_len}")))?;

        dst.reserve(LENGTH_PREFIX_LEN + body_len);
        dst.put_u32_le(declared);
        dst.put_u8(item.tag);
        dst.extend_from_slice(&item.payload);
        self.stats
            .record_bytes_out((LENGTH_PREFIX_LEN + body_len) as u64);
        Ok(())
    }
}

/// Writes and flushes one packet, failing with `WriteTimeout` if the peer
/// does not drain it within `limit`.
pub async fn send_within<S>(
    framed: &mut Framed<S, PacketCodec>,
    packet: Packet,
    limit: Duration,
) -> Result<(), HubError>
where
    S: AsyncWrite + Unpin,
{
    match tokio::time::timeout(limit, framed.send(packet)).await {
        Ok(result) => result,
        Err(_) => Err(HubError::WriteTimeout(limit)),
    }
}
