//! Text tree rendering of a finished topology
//!
//! The walk is depth-first from the root device over links. A device reached
//! a second time (a second parent, or a cycle back to an ancestor) is printed
//! as a back-reference and not descended into again.

use std::collections::HashSet;

use crate::device::{Device, DeviceAddr, DeviceStatus, LeafReason};
use crate::topology::{Link, Topology};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// Marker appended to devices that were already printed
pub const BACK_REFERENCE: &str = "↺";

/// Render the topology starting at its root device
pub fn render(topology: &Topology) -> String {
    match topology.root_address() {
        Some(root) => render_tree(topology, root),
        None => "No devices discovered".to_string(),
    }
}

/// Render the topology starting at `root`
pub fn render_tree(topology: &Topology, root: &DeviceAddr) -> String {
    let Some(root_device) = topology.get(root) else {
        return "No devices discovered".to_string();
    };

    struct Frame<'a> {
        device: &'a Device,
        prefix: String,
        next: usize,
    }

    let mut lines = vec![device_line(root_device)];
    let mut printed: HashSet<&DeviceAddr> = HashSet::new();
    printed.insert(&root_device.address);

    let mut stack = vec![Frame {
        device: root_device,
        prefix: String::new(),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let device = frame.device;
        if frame.next >= device.links.len() {
            stack.pop();
            continue;
        }

        let index = frame.next;
        frame.next += 1;

        let link = &device.links[index];
        let is_last = index + 1 == device.links.len();
        let line_prefix = format!("{}{}", frame.prefix, if is_last { LAST_BRANCH } else { BRANCH });
        let child_prefix = format!("{}{}", frame.prefix, if is_last { SPACE } else { PIPE });

        let remote = link.remote_address.as_ref().and_then(|addr| topology.get(addr));
        match remote {
            Some(remote) if printed.contains(&remote.address) => {
                lines.push(format!(
                    "{}{} → {} {}",
                    line_prefix,
                    link_label(link),
                    remote.label(),
                    BACK_REFERENCE
                ));
            }
            Some(remote) => {
                printed.insert(&remote.address);
                lines.push(format!(
                    "{}{} → {}",
                    line_prefix,
                    link_label(link),
                    device_line(remote)
                ));
                stack.push(Frame {
                    device: remote,
                    prefix: child_prefix,
                    next: 0,
                });
            }
            None => {
                lines.push(format!("{}{} → {}", line_prefix, link_label(link), leaf_label(link)));
            }
        }
    }

    lines.join("\n")
}

/// `[CDP+LLDP] GigabitEthernet1/0/1 ↔ GigabitEthernet1/0/48`
fn link_label(link: &Link) -> String {
    format!(
        "[{}] {} ↔ {}",
        link.protocols,
        or_unknown(&link.local_interface),
        or_unknown(&link.remote_interface)
    )
}

fn device_line(device: &Device) -> String {
    let mut line = format!("{} [{}]", device.label(), device.family);
    match &device.status {
        DeviceStatus::Unreachable { .. } => line.push_str(" (unreachable)"),
        DeviceStatus::Leaf {
            reason: LeafReason::NotCrawlable,
        } => line.push_str(" (not crawled)"),
        DeviceStatus::Leaf {
            reason: LeafReason::Cancelled,
        } => line.push_str(" (cancelled)"),
        DeviceStatus::Queued | DeviceStatus::Crawled => {}
    }
    line
}

/// Label for a link target that has no device entry
fn leaf_label(link: &Link) -> String {
    let host = or_unknown(&link.remote_hostname);
    match &link.remote_address {
        Some(addr) if host != addr.as_str() => format!("{} ({})", host, addr),
        Some(addr) => addr.to_string(),
        None => format!("{} (no management address)", host),
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "?"
    } else {
        value
    }
}
