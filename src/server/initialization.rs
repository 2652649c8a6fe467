// src/server/initialization.rs

//! Handles the hub initialization process, from TLS setup to binding the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::access::AccessList;
use crate::core::rooms::RoomRegistry;
use crate::core::state::HubState;
use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_rustls::{TlsAcceptor, rustls};
use tracing::{info, warn};

/// Initializes all hub components before starting the main loop.
pub async fn setup(config: Config, rooms: Arc<dyn RoomRegistry>) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let acceptor = setup_tls(&config).await?;

    let (host, port, max_clients) = (config.host.clone(), config.port, config.max_clients);
    let hub_init = HubState::initialize(config, rooms)?;
    info!("Hub state initialized.");

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!("ServerHub listening on {}:{}", host, port);

    Ok(ServerContext {
        state: hub_init.state,
        hub_events: Some(hub_init.event_rx),
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        acceptor,
        connection_permits: Arc::new(Semaphore::new(max_clients)),
    })
}

/// Sets up the TLS acceptor if TLS is enabled in the configuration.
async fn setup_tls(config: &Config) -> Result<Option<TlsAcceptor>> {
    if config.tls.enabled {
        info!("TLS is enabled. Loading certificate and key.");
        let certs = load_certs(&config.tls.cert_path)?;
        let key = load_key(&config.tls.key_path)?;
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
    } else {
        Ok(None)
    }
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open certificate file '{}': {}", path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("No certificates found in '{}'", path));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let key_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open private key file '{}': {}", path, e))?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow!("No private key found in key file '{}'", path))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    match config.max_frame_size {
        Some(limit) => info!("Frames larger than {} bytes will be rejected.", limit),
        None => warn!("WARNING: No 'max_frame_size' is set. Frame size is unbounded."),
    }
    info!(
        "Inactivity timeout {:?}, handshake timeout {:?}, at most {} clients.",
        config.inactivity_timeout, config.handshake_timeout, config.max_clients
    );
    if config.access.enabled
        && config.access.allowlist_enabled
        && AccessList::new(&config.access.allowlist).is_empty()
    {
        warn!("The allowlist is enabled but empty; every client will be refused.");
    }
}
