// src/core/state/client.rs

//! Contains state definitions related to client connections.

use crate::connection::ClientSession;
use dashmap::DashMap;
use std::sync::Arc;

/// Admitted clients keyed by session id.
pub type ClientMap = Arc<DashMap<u64, Arc<ClientSession>>>;
