// src/server/context.rs

use crate::core::events::HubEvent;
use crate::core::state::HubState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

/// Holds all the initialized state required to run the hub's main loop.
pub struct ServerContext {
    pub state: Arc<HubState>,
    /// Taken by the spawner when the hub task starts.
    pub hub_events: Option<mpsc::UnboundedReceiver<HubEvent>>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    pub acceptor: Option<TlsAcceptor>,
    pub connection_permits: Arc<Semaphore>,
}
