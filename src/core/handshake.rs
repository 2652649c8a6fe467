// src/core/handshake.rs

//! The handshake gate run on every fresh connection before it is admitted.
//!
//! The first frame must be a non-empty `Connect` carrying the client's protocol
//! version followed by its identity record. The version is compared with the
//! last decimal digit ignored, then the identity goes through access control.

use crate::core::HubError;
use crate::core::access::AccessDenied;
use crate::core::protocol::{
    CommandType, Packet, PacketCodec, PayloadReader, PlayerInfo, send_within,
};
use crate::core::state::HubState;
use futures::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Why a connection was refused before admission.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandshakeError {
    #[error("no Connect frame within {0:?}")]
    Timeout(Duration),

    #[error("transport failed during handshake: {0}")]
    Transport(HubError),

    #[error("connection closed before the handshake completed")]
    Closed,

    #[error("expected Connect as the first command, got tag {0}")]
    UnexpectedCommand(u8),

    #[error("Connect frame carried no payload")]
    EmptyPayload,

    #[error("protocol version mismatch (server {server}, client {client})")]
    VersionMismatch { server: u32, client: u32 },

    #[error("malformed identity record: {0}")]
    MalformedIdentity(HubError),

    #[error("{} ({player})", .denied.reason())]
    Denied { denied: AccessDenied, player: String },
}

/// Derives the wire protocol version from a `major.minor.patch` package version.
///
/// The decimal fields are concatenated with a trailing revision of `0`, so
/// `0.6.1` becomes `610`. Returns `None` if no field carries a number.
pub fn server_protocol_version(pkg_version: &str) -> Option<u32> {
    let core = pkg_version.split(['-', '+']).next().unwrap_or_default();
    let mut digits = String::new();
    for field in core.split('.') {
        let numeric: String = field.chars().take_while(char::is_ascii_digit).collect();
        if numeric.is_empty() {
            return None;
        }
        digits.push_str(&numeric);
    }
    digits.push('0');
    digits.parse().ok()
}

/// True if both versions agree on every decimal digit but the last.
pub fn versions_compatible(client: u32, server: u32) -> bool {
    fn without_last_digit(version: u32) -> String {
        let mut s = version.to_string();
        s.pop();
        s
    }
    without_last_digit(client) == without_last_digit(server)
}

/// The notice sent to a client whose version is incompatible.
pub fn version_mismatch_reason(server: u32, client: u32) -> String {
    format!("Plugin version mismatch:\nServer: {server}\nClient: {client}")
}

/// Reads and validates the first frame of a connection.
///
/// On a version mismatch or an access-control refusal a best-effort disconnect
/// notice is written before returning the error. The caller closes the socket.
pub async fn perform<S>(
    framed: &mut Framed<S, PacketCodec>,
    addr: SocketAddr,
    state: &HubState,
) -> Result<PlayerInfo, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let timeout = state.config.handshake_timeout;
    let first = match tokio::time::timeout(timeout, framed.next()).await {
        Err(_) => return Err(HandshakeError::Timeout(timeout)),
        Ok(None) => return Err(HandshakeError::Closed),
        Ok(Some(Err(e))) => return Err(HandshakeError::Transport(e)),
        Ok(Some(Ok(packet))) => packet,
    };

    if first.command() != Some(CommandType::Connect) {
        return Err(HandshakeError::UnexpectedCommand(first.tag));
    }
    if first.payload.is_empty() {
        return Err(HandshakeError::EmptyPayload);
    }

    let mut reader = PayloadReader::new(first.payload);
    let client_version = reader
        .read_u32()
        .map_err(HandshakeError::MalformedIdentity)?;
    let server_version = state.protocol_version;
    if !versions_compatible(client_version, server_version) {
        send_notice(
            framed,
            addr,
            &version_mismatch_reason(server_version, client_version),
            state.config.send_timeout,
        )
        .await;
        return Err(HandshakeError::VersionMismatch {
            server: server_version,
            client: client_version,
        });
    }

    let player = PlayerInfo::decode(reader.rest()).map_err(HandshakeError::MalformedIdentity)?;

    if let Err(denied) = state.access.check(addr.ip(), &player) {
        send_notice(framed, addr, denied.reason(), state.config.send_timeout).await;
        return Err(HandshakeError::Denied {
            denied,
            player: player.name,
        });
    }

    debug!(
        "Handshake from {} accepted for '{}' ({})",
        addr, player.name, player.id
    );
    Ok(player)
}

/// Writes a disconnect notice, swallowing any failure.
async fn send_notice<S>(
    framed: &mut Framed<S, PacketCodec>,
    addr: SocketAddr,
    reason: &str,
    limit: Duration,
)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let notice = Packet::disconnect_with_reason(reason);
    if let Err(e) = send_within(framed, notice, limit).await {
        warn!("Could not deliver rejection notice to {}: {}", addr, e);
    }
}
