// src/config.rs

//! Manages hub configuration: loading, defaults, and validation.

use crate::core::access::IpRange;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Entries of a single block or allow list.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AccessListConfig {
    /// Addresses, CIDR blocks or `start-end` ranges.
    #[serde(default)]
    pub ips: Vec<IpRange>,
    #[serde(default)]
    pub ids: Vec<u64>,
    #[serde(default)]
    pub names: Vec<String>,
}

/// Access control applied during the handshake.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccessConfig {
    /// Master switch. When false neither list is consulted.
    #[serde(default = "default_access_enabled")]
    pub enabled: bool,
    /// When true, only players matching the allow list are admitted.
    #[serde(default)]
    pub allowlist_enabled: bool,
    #[serde(default)]
    pub blocklist: AccessListConfig,
    #[serde(default)]
    pub allowlist: AccessListConfig,
}

fn default_access_enabled() -> bool {
    true
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled: default_access_enabled(),
            allowlist_enabled: false,
            blocklist: AccessListConfig::default(),
            allowlist: AccessListConfig::default(),
        }
    }
}

/// Configuration for TLS encryption of client connections.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_cert_path() -> String {
    "serverhub.crt".to_string()
}
fn default_key_path() -> String {
    "serverhub.key".to_string()
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    3701
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// The resolved hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Overrides the protocol version derived from the package version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<u32>,
    /// Upper bound on a frame's declared length. Unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frame_size: Option<u32>,
    /// How long a fresh connection may take to send its Connect frame.
    #[serde(with = "humantime_serde", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,
    /// How long a single outgoing packet may wait for the peer to drain it.
    #[serde(with = "humantime_serde", default = "default_send_timeout")]
    pub send_timeout: Duration,
    /// Time spent in a room or game without activity before a client is kicked.
    #[serde(with = "humantime_serde", default = "default_inactivity_timeout")]
    pub inactivity_timeout: Duration,
    /// Period of the shared liveness sweep.
    #[serde(with = "humantime_serde", default = "default_liveness_tick")]
    pub liveness_tick: Duration,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3700
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    1024
}
fn default_handshake_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_send_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_inactivity_timeout() -> Duration {
    Duration::from_millis(45_000)
}
fn default_liveness_tick() -> Duration {
    Duration::from_millis(100)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            protocol_version: None,
            max_frame_size: None,
            handshake_timeout: default_handshake_timeout(),
            send_timeout: default_send_timeout(),
            inactivity_timeout: default_inactivity_timeout(),
            liveness_tick: default_liveness_tick(),
            access: AccessConfig::default(),
            tls: TlsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.inactivity_timeout.is_zero() {
            return Err(anyhow!("inactivity_timeout cannot be 0"));
        }
        if self.liveness_tick.is_zero() {
            return Err(anyhow!("liveness_tick cannot be 0"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(anyhow!("handshake_timeout cannot be 0"));
        }
        if self.send_timeout.is_zero() {
            return Err(anyhow!("send_timeout cannot be 0"));
        }
        if let Some(max) = self.max_frame_size
            && max == 0
        {
            return Err(anyhow!("max_frame_size cannot be 0; remove it to disable the limit"));
        }
        if self.metrics.enabled && self.metrics.port == self.port {
            return Err(anyhow!(
                "metrics.port ({}) must differ from the hub port",
                self.metrics.port
            ));
        }
        if self.liveness_tick > self.inactivity_timeout {
            warn!(
                "liveness_tick ({:?}) is longer than inactivity_timeout ({:?}); kicks will be late.",
                self.liveness_tick, self.inactivity_timeout
            );
        }
        Ok(())
    }
}
