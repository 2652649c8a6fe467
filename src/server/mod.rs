// src/server/mod.rs

use crate::config::Config;
use crate::core::rooms::{InMemoryRegistry, RoomRegistry};
use anyhow::Result;
use std::sync::Arc;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;
mod stream;

pub use stream::AnyStream;

/// Runs the hub with the built-in in-memory room registry.
pub async fn run(config: Config) -> Result<()> {
    run_with_registry(config, Arc::new(InMemoryRegistry::new())).await
}

/// The main startup function, orchestrating all setup phases around an
/// externally provided room registry.
pub async fn run_with_registry(config: Config, rooms: Arc<dyn RoomRegistry>) -> Result<()> {
    // 1. Initialize hub state, listener and TLS.
    let mut server_context = initialization::setup(config, rooms).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context).await?;

    // 3. Accept connections until shutdown.
    connection_loop::run(server_context).await
}
