// src/core/state/stats.rs

//! Contains the hub's traffic and connection counters.
//!
//! The counters live in a `prometheus::Registry` owned by this struct rather than
//! the process-wide default registry, so every `HubState` (and every test) gets
//! its own independent set.

use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use tracing::error;

/// Holds all hub-wide statistics.
#[derive(Debug, Clone)]
pub struct StatsState {
    registry: Registry,
    bytes_in: IntCounter,
    bytes_out: IntCounter,
    connections_total: IntCounter,
    connected_clients: IntGauge,
    rejected_handshakes: IntCounter,
    kicked_clients: IntCounter,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap_or_else(|e| {
        panic!("invalid metric definition for '{name}': {e}");
    });
    if let Err(e) = registry.register(Box::new(counter.clone())) {
        error!("Failed to register metric '{}': {}", name, e);
    }
    counter
}

impl StatsState {
    /// Creates a new `StatsState` with all counters at zero.
    pub fn new() -> Self {
        let registry = Registry::new();
        let connected_clients = IntGauge::new(
            "serverhub_connected_clients",
            "Number of currently admitted clients.",
        )
        .unwrap_or_else(|e| panic!("invalid metric definition: {e}"));
        if let Err(e) = registry.register(Box::new(connected_clients.clone())) {
            error!("Failed to register connected clients gauge: {}", e);
        }

        Self {
            bytes_in: counter(
                &registry,
                "serverhub_network_bytes_in_total",
                "Total bytes received in complete frames.",
            ),
            bytes_out: counter(
                &registry,
                "serverhub_network_bytes_out_total",
                "Total bytes written in encoded frames.",
            ),
            connections_total: counter(
                &registry,
                "serverhub_connections_received_total",
                "Total number of transport connections accepted.",
            ),
            rejected_handshakes: counter(
                &registry,
                "serverhub_rejected_handshakes_total",
                "Total number of connections refused during the handshake.",
            ),
            kicked_clients: counter(
                &registry,
                "serverhub_kicked_clients_total",
                "Total number of clients kicked by the server.",
            ),
            connected_clients,
            registry,
        }
    }

    pub fn record_bytes_in(&self, n: u64) {
        self.bytes_in.inc_by(n);
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.get()
    }

    pub fn record_bytes_out(&self, n: u64) {
        self.bytes_out.inc_by(n);
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.get()
    }

    pub fn increment_total_connections(&self) {
        self.connections_total.inc();
    }

    pub fn get_total_connections(&self) -> u64 {
        self.connections_total.get()
    }

    pub fn increment_rejected_handshakes(&self) {
        self.rejected_handshakes.inc();
    }

    pub fn get_rejected_handshakes(&self) -> u64 {
        self.rejected_handshakes.get()
    }

    pub fn increment_kicked(&self) {
        self.kicked_clients.inc();
    }

    pub fn get_kicked_clients(&self) -> u64 {
        self.kicked_clients.get()
    }

    pub fn client_admitted(&self) {
        self.connected_clients.inc();
    }

    pub fn client_removed(&self) {
        self.connected_clients.dec();
    }

    pub fn connected_clients(&self) -> i64 {
        self.connected_clients.get()
    }

    /// Encodes every counter in the Prometheus text exposition format.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|e| {
                error!("Failed to encode metrics: {}", e);
                String::new()
            })
    }
}
