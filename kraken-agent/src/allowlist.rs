//! Source address allow-list
//!
//! Built once at startup from a comma-separated list of IPv4 addresses.
//! An empty list lets every client through.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// An allow-list entry that is not a dotted-quad IPv4 address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown IP pattern: {0}")]
pub struct AllowListError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    addresses: Vec<Ipv4Addr>,
}

impl AllowList {
    /// A list that permits every client
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse `"10.0.0.5, 10.0.0.6"`
    ///
    /// Spaces are ignored and empty entries skipped. Any other entry that is
    /// not an IPv4 address fails the whole list.
    pub fn parse(spec: &str) -> Result<Self, AllowListError> {
        let mut addresses = Vec::new();
        for entry in spec.split(',') {
            let entry: String = entry.chars().filter(|c| *c != ' ').collect();
            if entry.is_empty() {
                continue;
            }
            let address =
                Ipv4Addr::from_str(&entry).map_err(|_| AllowListError(entry.clone()))?;
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        Ok(Self { addresses })
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn addresses(&self) -> &[Ipv4Addr] {
        &self.addresses
    }

    /// True if `ip` may use the agent
    pub fn permits(&self, ip: IpAddr) -> bool {
        if self.is_empty() {
            return true;
        }
        match ip.to_canonical() {
            IpAddr::V4(v4) => self.addresses.contains(&v4),
            IpAddr::V6(_) => false,
        }
    }
}

impl FromStr for AllowList {
    type Err = AllowListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
