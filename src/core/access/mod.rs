// src/core/access/mod.rs

//! Block and allow lists consulted by the handshake gate.

mod ip_range;

pub use ip_range::{IpRange, IpRangeParseError};

use crate::config::{AccessConfig, AccessListConfig};
use crate::core::protocol::PlayerInfo;
use std::collections::HashSet;
use std::net::IpAddr;

pub const BANNED_REASON: &str = "You are banned on this ServerHub!";
pub const NOT_ALLOWED_REASON: &str = "You are not whitelisted on this ServerHub!";

/// Why a player was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    Blocked,
    NotAllowed,
}

impl AccessDenied {
    /// The text shown to the rejected client.
    pub fn reason(&self) -> &'static str {
        match self {
            AccessDenied::Blocked => BANNED_REASON,
            AccessDenied::NotAllowed => NOT_ALLOWED_REASON,
        }
    }
}

/// One list of address ranges, player ids and player names.
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    ips: Vec<IpRange>,
    ids: HashSet<u64>,
    names: HashSet<String>,
}

impl AccessList {
    pub fn new(config: &AccessListConfig) -> Self {
        Self {
            ips: config.ips.clone(),
            ids: config.ids.iter().copied().collect(),
            names: config.names.iter().cloned().collect(),
        }
    }

    /// True if the address, the player id or the exact player name is listed.
    pub fn matches(&self, addr: IpAddr, player: &PlayerInfo) -> bool {
        self.ips.iter().any(|range| range.contains(addr))
            || self.ids.contains(&player.id)
            || self.names.contains(&player.name)
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty() && self.ids.is_empty() && self.names.is_empty()
    }
}

/// Read-only access policy shared by all connections.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    enabled: bool,
    allowlist_enabled: bool,
    blocklist: AccessList,
    allowlist: AccessList,
}

impl AccessControl {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            enabled: config.enabled,
            allowlist_enabled: config.allowlist_enabled,
            blocklist: AccessList::new(&config.blocklist),
            allowlist: AccessList::new(&config.allowlist),
        }
    }

    /// A policy that admits everyone.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Checks a player against the block list, then the allow list when it is enabled.
    pub fn check(&self, addr: IpAddr, player: &PlayerInfo) -> Result<(), AccessDenied> {
        if !self.enabled {
            return Ok(());
        }
        if self.blocklist.matches(addr, player) {
            return Err(AccessDenied::Blocked);
        }
        if self.allowlist_enabled && !self.allowlist.matches(addr, player) {
            return Err(AccessDenied::NotAllowed);
        }
        Ok(())
    }
}
