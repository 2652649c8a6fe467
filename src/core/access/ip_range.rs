// src/core/access/ip_range.rs

//! Address ranges used by the block and allow lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// An inclusive range of IP addresses.
///
/// Accepted notations: a single address (`10.1.2.3`), CIDR (`10.0.0.0/8`,
/// `fd00::/8`) and an explicit range (`192.168.0.10-192.168.0.20`).
/// Both ends are always the same address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpRange {
    start: IpAddr,
    end: IpAddr,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid IP range '{0}'")]
pub struct IpRangeParseError(String);

fn to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

impl IpRange {
    pub fn single(addr: IpAddr) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        // IPv4-mapped IPv6 peers are compared as plain IPv4.
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
            v4 => v4,
        };
        if addr.is_ipv4() != self.start.is_ipv4() {
            return false;
        }
        let value = to_u128(addr);
        to_u128(self.start) <= value && value <= to_u128(self.end)
    }

    fn from_cidr(base: IpAddr, prefix: u32) -> Option<Self> {
        let bits = if base.is_ipv4() { 32 } else { 128 };
        if prefix > bits {
            return None;
        }
        let host_bits = bits - prefix;
        let host_mask: u128 = if host_bits == 0 {
            0
        } else if host_bits >= 128 {
            u128::MAX
        } else {
            (1u128 << host_bits) - 1
        };
        let start = to_u128(base) & !host_mask;
        let end = start | host_mask;
        let (start, end) = if base.is_ipv4() {
            (
                IpAddr::V4((start as u32).into()),
                IpAddr::V4((end as u32).into()),
            )
        } else {
            (IpAddr::V6(start.into()), IpAddr::V6(end.into()))
        };
        Some(Self { start, end })
    }
}

impl FromStr for IpRange {
    type Err = IpRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || IpRangeParseError(s.to_string());

        if let Some((base, prefix)) = s.split_once('/') {
            let base: IpAddr = base.trim().parse().map_err(|_| err())?;
            let prefix: u32 = prefix.trim().parse().map_err(|_| err())?;
            return Self::from_cidr(base, prefix).ok_or_else(err);
        }

        if let Some((start, end)) = s.split_once('-') {
            let start: IpAddr = start.trim().parse().map_err(|_| err())?;
            let end: IpAddr = end.trim().parse().map_err(|_| err())?;
            if start.is_ipv4() != end.is_ipv4() || to_u128(start) > to_u128(end) {
                return Err(err());
            }
            return Ok(Self { start, end });
        }

        s.parse::<IpAddr>().map(Self::single).map_err(|_| err())
    }
}

impl TryFrom<String> for IpRange {
    type Error = IpRangeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl From<IpRange> for String {
    fn from(range: IpRange) -> Self {
        range.to_string()
    }
}
