// src/server/spawner.rs

//! Spawns the hub's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::hub::Hub;
use crate::core::tasks::liveness::LivenessMonitor;
use anyhow::{Result, anyhow};
use tracing::info;

/// Spawns all background tasks into the context's JoinSet.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let hub_state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    // --- Metrics Server ---
    if hub_state.config.metrics.enabled {
        let metrics_state = hub_state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_state, shutdown_rx_metrics).await;
            Ok(())
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Hub ---
    let events = ctx
        .hub_events
        .take()
        .ok_or_else(|| anyhow!("hub event receiver was already taken"))?;
    let hub = Hub::new(hub_state.clone(), events);
    let shutdown_rx_hub = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        hub.run(shutdown_rx_hub).await;
        Ok(())
    });

    // --- Liveness ---
    let monitor = LivenessMonitor::new(hub_state.clone());
    let shutdown_rx_liveness = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        monitor.run(shutdown_rx_liveness).await;
        Ok(())
    });

    info!("All background tasks have been spawned.");
    Ok(())
}
