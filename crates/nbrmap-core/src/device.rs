//! Device types for nodes of the discovered topology

use serde::{Deserialize, Serialize};

use crate::topology::Link;

/// Family assigned when no classification rule matches
pub const UNKNOWN_FAMILY: &str = "unknown";

/// Management address of a device; the identity key of the topology
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddr(pub String);

impl DeviceAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceAddr {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for DeviceAddr {
    fn from(addr: String) -> Self {
        Self::new(addr)
    }
}

/// Why a device was recorded but never expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafReason {
    /// Advertised capabilities are not in the crawl allow-list
    NotCrawlable,
    /// The run was cancelled before the device was reached
    Cancelled,
}

/// Crawl state of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Enqueued for discovery
    Queued,
    /// Session opened and neighbors collected
    Crawled,
    /// Recorded but not expanded
    Leaf { reason: LeafReason },
    /// Session could not be opened
    Unreachable { error: String },
}

impl DeviceStatus {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// A node of the topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Management address (unique)
    pub address: DeviceAddr,
    /// Hostname, canonical once the device has been crawled
    pub hostname: String,
    /// Classified device family
    pub family: String,
    /// Raw platform string as advertised by neighbors
    pub platform: String,
    /// Depth at which the device was first discovered
    pub depth: u32,
    pub status: DeviceStatus,
    /// Outgoing links observed from this device
    pub links: Vec<Link>,
}

impl Device {
    /// Create a queued device with no links
    pub fn new(
        address: DeviceAddr,
        hostname: impl Into<String>,
        family: impl Into<String>,
        platform: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            address,
            hostname: hostname.into(),
            family: family.into(),
            platform: platform.into(),
            depth,
            status: DeviceStatus::Queued,
            links: Vec::new(),
        }
    }

    /// `hostname (address)`, or just the address when the hostname is unknown
    pub fn label(&self) -> String {
        if self.hostname.is_empty() || self.hostname == self.address.0 {
            self.address.to_string()
        } else {
            format!("{} ({})", self.hostname, self.address)
        }
    }
}
