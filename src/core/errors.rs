// src/core/errors.rs

//! Defines the primary error type for the connection core.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The main error enum, representing all failures the connection core can observe.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// A frame declared a zero-length payload, so it carries no command tag.
    #[error("Received an empty frame")]
    EmptyFrame,

    #[error("Frame of {size} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The peer stopped draining its socket.
    #[error("Write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for HubError {
    fn clone(&self) -> Self {
        match self {
            HubError::Io(e) => HubError::Io(Arc::clone(e)),
            HubError::ConnectionClosed => HubError::ConnectionClosed,
            HubError::EmptyFrame => HubError::EmptyFrame,
            HubError::FrameTooLarge { size, max } => HubError::FrameTooLarge {
                size: *size,
                max: *max,
            },
            HubError::MalformedPayload(s) => HubError::MalformedPayload(s.clone()),
            HubError::WriteTimeout(d) => HubError::WriteTimeout(*d),
            HubError::Handshake(s) => HubError::Handshake(s.clone()),
            HubError::Internal(s) => HubError::Internal(s.clone()),
        }
    }
}

impl PartialEq for HubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HubError::Io(e1), HubError::Io(e2)) => e1.to_string() == e2.to_string(),
            (
                HubError::FrameTooLarge { size: s1, max: m1 },
                HubError::FrameTooLarge { size: s2, max: m2 },
            ) => s1 == s2 && m1 == m2,
            (HubError::MalformedPayload(s1), HubError::MalformedPayload(s2)) => s1 == s2,
            (HubError::WriteTimeout(d1), HubError::WriteTimeout(d2)) => d1 == d2,
            (HubError::Handshake(s1), HubError::Handshake(s2)) => s1 == s2,
            (HubError::Internal(s1), HubError::Internal(s2)) => s1 == s2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for HubError {
    fn from(e: std::io::Error) -> Self {
        HubError::Io(Arc::new(e))
    }
}

impl From<std::string::FromUtf8Error> for HubError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        HubError::MalformedPayload(format!("invalid UTF-8 string: {e}"))
    }
}

impl HubError {
    /// True for the errors a peer produces by simply going away.
    pub fn is_normal_disconnect(&self) -> bool {
        match self {
            HubError::ConnectionClosed => true,
            HubError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}
