//! Topology graph of discovered devices and the links between them

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

use crate::device::{Device, DeviceAddr, DeviceStatus};
use crate::neighbor::{NeighborRecord, ProtocolSet};

/// An edge from the owning device towards one neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Interface on the owning device
    pub local_interface: String,
    /// Interface on the neighbor
    pub remote_interface: String,
    /// Neighbor hostname as reported by the discovery protocol
    pub remote_hostname: String,
    /// Neighbor management address; `None` means the link can never be expanded
    pub remote_address: Option<DeviceAddr>,
    /// Protocols that observed the link
    pub protocols: ProtocolSet,
}

impl Link {
    /// Build a link from a merged neighbor record
    pub fn from_record(record: &NeighborRecord) -> Self {
        Self {
            local_interface: record.local_interface.clone(),
            remote_interface: record.remote_interface.clone(),
            remote_hostname: record.remote_hostname.clone(),
            remote_address: record.remote_address.as_deref().map(DeviceAddr::new),
            protocols: record.protocols.clone(),
        }
    }

    /// Same local interface and same neighbor (by address, or by hostname if no address)
    fn same_endpoint(&self, other: &Link) -> bool {
        if self.local_interface != other.local_interface {
            return false;
        }
        match (&self.remote_address, &other.remote_address) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.remote_hostname == other.remote_hostname,
            _ => false,
        }
    }

    /// Key identifying the far end, for adjacency counting
    fn remote_key(&self) -> String {
        match &self.remote_address {
            Some(addr) => addr.0.clone(),
            None => format!("host:{}", self.remote_hostname),
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySummary {
    /// Device entries
    pub devices: usize,
    /// Directed links across all devices
    pub links: usize,
    /// Distinct undirected device pairs
    pub adjacencies: usize,
    /// Devices that were crawled successfully
    pub crawled: usize,
    /// Devices whose session could not be opened
    pub unreachable: usize,
    /// Devices recorded but not expanded
    pub leaves: usize,
}

/// Discovered topology, keyed by management address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    /// All devices indexed by address
    devices: BTreeMap<DeviceAddr, Device>,
    /// Seed device address
    root: Option<DeviceAddr>,
}

impl Topology {
    /// Create a new empty topology
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            root: None,
        }
    }

    /// Set the device the renderer starts from
    pub fn set_root(&mut self, addr: DeviceAddr) {
        self.root = Some(addr);
    }

    pub fn root_address(&self) -> Option<&DeviceAddr> {
        self.root.as_ref()
    }

    /// Get the root device
    pub fn root(&self) -> Option<&Device> {
        self.root.as_ref().and_then(|addr| self.devices.get(addr))
    }

    /// Insert a device unless one already exists for its address
    ///
    /// Returns `false` and leaves the existing entry untouched on a duplicate.
    pub fn insert_device(&mut self, device: Device) -> bool {
        if self.devices.contains_key(&device.address) {
            trace!(address = %device.address, "Device already present");
            return false;
        }
        debug!(
            address = %device.address,
            hostname = %device.hostname,
            depth = device.depth,
            "Device added"
        );
        self.devices.insert(device.address.clone(), device);
        true
    }

    /// Attach a link to `owner`, folding it into an existing link to the same endpoint
    ///
    /// Returns `true` when a new link was created.
    pub fn add_link(&mut self, owner: &DeviceAddr, link: Link) -> bool {
        let Some(device) = self.devices.get_mut(owner) else {
            debug!(owner = %owner, "Link owner not in topology, dropping link");
            return false;
        };

        if let Some(existing) = device.links.iter_mut().find(|l| l.same_endpoint(&link)) {
            existing.protocols.extend(&link.protocols);
            return false;
        }

        device.links.push(link);
        true
    }

    pub fn contains(&self, addr: &DeviceAddr) -> bool {
        self.devices.contains_key(addr)
    }

    /// Get a device by address
    pub fn get(&self, addr: &DeviceAddr) -> Option<&Device> {
        self.devices.get(addr)
    }

    pub fn get_mut(&mut self, addr: &DeviceAddr) -> Option<&mut Device> {
        self.devices.get_mut(addr)
    }

    /// Get all devices, ordered by address
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.devices.values().map(|d| d.links.len()).sum()
    }

    /// Number of distinct undirected device pairs joined by at least one link
    pub fn adjacency_count(&self) -> usize {
        let mut pairs = BTreeSet::new();
        for device in self.devices.values() {
            for link in &device.links {
                let a = device.address.0.clone();
                let b = link.remote_key();
                pairs.insert(if a <= b { (a, b) } else { (b, a) });
            }
        }
        pairs.len()
    }

    pub fn summary(&self) -> TopologySummary {
        let mut summary = TopologySummary {
            devices: self.device_count(),
            links: self.link_count(),
            adjacencies: self.adjacency_count(),
            ..Default::default()
        };
        for device in self.devices.values() {
            match device.status {
                DeviceStatus::Crawled => summary.crawled += 1,
                DeviceStatus::Unreachable { .. } => summary.unreachable += 1,
                DeviceStatus::Leaf { .. } => summary.leaves += 1,
                DeviceStatus::Queued => {}
            }
        }
        summary
    }

    /// Get topology as a list-shaped structure for API responses
    pub fn to_graph(&self) -> TopologyGraph {
        TopologyGraph {
            root: self.root.clone(),
            devices: self.devices.values().cloned().collect(),
        }
    }
}

/// Serializable topology graph for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyGraph {
    pub root: Option<DeviceAddr>,
    pub devices: Vec<Device>,
}
