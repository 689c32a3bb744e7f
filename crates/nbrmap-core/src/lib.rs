//! nbrmap Core - Topology data model and rendering
//!
//! This crate provides the foundational types for nbrmap:
//! - Neighbor records reported by CDP and LLDP
//! - Devices keyed by management address, with their outgoing links
//! - The topology graph accumulated during a discovery run
//! - Text tree rendering of a finished topology

pub mod device;
pub mod neighbor;
pub mod render;
pub mod topology;

pub use device::{Device, DeviceAddr, DeviceStatus, LeafReason, UNKNOWN_FAMILY};
pub use neighbor::{
    canonical_interface, parse_capabilities, strip_domain, NeighborRecord, Protocol, ProtocolSet,
};
pub use render::{render, render_tree};
pub use topology::{Link, Topology, TopologyGraph, TopologySummary};
