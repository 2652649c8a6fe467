// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use super::session::ClientSession;
use std::sync::Arc;
use tracing::debug;

/// Tears the session down when the connection task leaves its scope by any
/// path, including an unwinding panic.
pub struct ConnectionGuard {
    session: Arc<ClientSession>,
}

impl ConnectionGuard {
    pub(crate) fn new(session: Arc<ClientSession>) -> Self {
        Self { session }
    }

    pub(crate) fn session(&self) -> &Arc<ClientSession> {
        &self.session
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.session.teardown() {
            debug!(
                "ConnectionGuard tore down session {} ({})",
                self.session.id(),
                self.session.addr()
            );
        }
    }
}
