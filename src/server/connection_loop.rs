// src/server/connection_loop.rs

//! Contains the main hub loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use super::stream::AnyStream;
use crate::connection::ConnectionHandler;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The main loop that accepts connections and handles graceful shutdown.
pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let mut client_tasks = JoinSet::new();

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                let (socket, addr) = match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                debug!("Accepted new connection from: {}", addr);
                ctx.state.stats.increment_total_connections();

                let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                    warn!("Refusing {}: max_clients ({}) reached.", addr, ctx.state.config.max_clients);
                    drop(socket);
                    continue;
                };
                let state = ctx.state.clone();
                let global_shutdown_rx = ctx.shutdown_tx.subscribe();
                let acceptor = ctx.acceptor.clone();

                client_tasks.spawn(async move {
                    let _permit = permit;
                    let stream = match acceptor {
                        Some(acceptor) => match acceptor.accept(socket).await {
                            Ok(tls_stream) => {
                                debug!("TLS handshake successful for {addr}");
                                AnyStream::Tls(Box::new(tls_stream))
                            }
                            Err(e) => {
                                warn!("TLS handshake error for {addr}: {e}");
                                return;
                            }
                        },
                        None => AnyStream::Tcp(socket),
                    };
                    if let Err(e) = stream.tcp().set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    debug!("Serving {} (tls: {})", addr, stream.is_tls());
                    let handler = ConnectionHandler::new(stream, addr, state, global_shutdown_rx);
                    if let Err(e) = handler.run().await {
                        warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                    }
                });
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No task was listening for the shutdown signal.");
    }

    if tokio::time::timeout(Duration::from_secs(5), async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for clients to disconnect; aborting the rest.");
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("ServerHub shutdown complete.");
    Ok(())
}
