//! Parser for `show lldp neighbors detail` output
//!
//! Handles the IOS/IOS-XE layout (`Local Intf:` first, `Management Addresses:`
//! section with `IP:` lines) and the NX-OS layout (`Local Port id:` and a
//! single-line `Management Address:`).

use nbrmap_core::{canonical_interface, parse_capabilities, strip_domain, NeighborRecord, Protocol};
use tracing::{debug, warn};

use crate::text::{address, after_label, append, is_delimiter};

/// Labels that end a multi-line `System Description:` value
const FIELD_LABELS: &[&str] = &[
    "Local Intf:",
    "Local Port id:",
    "Chassis id:",
    "Port id:",
    "Port Description:",
    "System Name:",
    "System Description:",
    "Time remaining:",
    "System Capabilities:",
    "Enabled Capabilities:",
    "Management Address",
    "Auto Negotiation",
    "Physical media",
    "Media Attachment",
    "Vlan ID:",
    "Peer Source MAC:",
    "Total entries displayed:",
];

/// Fields collected for one neighbor before it is turned into a record
#[derive(Debug, Default)]
struct LldpBlock {
    local_interface: Option<String>,
    chassis_id: Option<String>,
    port_id: Option<String>,
    port_description: Option<String>,
    system_name: Option<String>,
    system_description: String,
    system_capabilities: Option<String>,
    enabled_capabilities: Option<String>,
    management_address: Option<String>,
}

impl LldpBlock {
    fn is_empty(&self) -> bool {
        self.local_interface.is_none()
            && self.chassis_id.is_none()
            && self.port_id.is_none()
            && self.system_name.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Fields,
    Description,
    ManagementAddresses,
}

/// Parse LLDP detail output into neighbor records, in input order
///
/// Never fails: unrecognized lines are skipped and empty input yields no records.
pub fn parse_lldp(output: &str) -> Vec<NeighborRecord> {
    let mut neighbors = Vec::new();
    let mut current = LldpBlock::default();
    let mut section = Section::Fields;

    for raw in output.lines() {
        let line = raw.trim();

        if line.is_empty() {
            if section == Section::Description && !current.system_description.is_empty() {
                section = Section::Fields;
            }
            continue;
        }

        if is_delimiter(line) {
            finish(&mut neighbors, std::mem::take(&mut current));
            section = Section::Fields;
            continue;
        }

        let is_label = FIELD_LABELS.iter().any(|label| after_label(line, label).is_some());

        match section {
            Section::Description if !is_label => {
                append(&mut current.system_description, line);
                continue;
            }
            Section::ManagementAddresses => {
                let value = after_label(line, "IP:").or_else(|| after_label(line, "IPv4:"));
                if let Some(value) = value {
                    if current.management_address.is_none() {
                        current.management_address = address(value);
                    }
                    continue;
                }
                if !is_label {
                    // IPV6:, OID: and friends
                    continue;
                }
            }
            _ => {}
        }
        section = Section::Fields;

        if let Some(value) = after_label(line, "Chassis id:") {
            if current.chassis_id.is_some() {
                finish(&mut neighbors, std::mem::take(&mut current));
            }
            current.chassis_id = Some(value.to_string());
        } else if let Some(value) =
            after_label(line, "Local Intf:").or_else(|| after_label(line, "Local Port id:"))
        {
            current.local_interface = Some(value.to_string());
        } else if let Some(value) = after_label(line, "Port id:") {
            current.port_id = Some(value.to_string());
        } else if let Some(value) = after_label(line, "Port Description:") {
            current.port_description = Some(value.to_string());
        } else if let Some(value) = after_label(line, "System Name:") {
            current.system_name = Some(value.to_string());
        } else if let Some(value) = after_label(line, "System Description:") {
            section = Section::Description;
            if !value.is_empty() {
                append(&mut current.system_description, value);
            }
        } else if let Some(value) = after_label(line, "System Capabilities:") {
            current.system_capabilities = Some(value.to_string());
        } else if let Some(value) = after_label(line, "Enabled Capabilities:") {
            current.enabled_capabilities = Some(value.to_string());
        } else if after_label(line, "Management Addresses:").is_some() {
            section = Section::ManagementAddresses;
        } else if let Some(value) = after_label(line, "Management Address:") {
            if current.management_address.is_none() {
                current.management_address = address(value);
            }
        }
    }

    finish(&mut neighbors, current);
    debug!("Parsed {} LLDP neighbors", neighbors.len());
    neighbors
}

fn finish(neighbors: &mut Vec<NeighborRecord>, block: LldpBlock) {
    if block.is_empty() {
        return;
    }
    if let Some(neighbor) = build_neighbor(block) {
        neighbors.push(neighbor);
    }
}

fn build_neighbor(block: LldpBlock) -> Option<NeighborRecord> {
    let Some(local) = block.local_interface.filter(|s| !s.is_empty()) else {
        let name = block.system_name.or(block.chassis_id).unwrap_or_default();
        warn!(neighbor = %name, "Dropping LLDP entry without a local interface");
        return None;
    };

    let mut record = NeighborRecord::new(Protocol::Lldp);
    record.local_interface = canonical_interface(&local);
    record.remote_interface = block
        .port_id
        .filter(|p| !p.is_empty())
        .or(block.port_description)
        .map(|p| canonical_interface(&p))
        .unwrap_or_default();
    record.remote_hostname = block.system_name.map(|n| strip_domain(&n)).unwrap_or_default();
    record.remote_address = block.management_address;
    record.description = block.system_description;
    record.capabilities = block
        .system_capabilities
        .or(block.enabled_capabilities)
        .map(|c| parse_capabilities(&c))
        .unwrap_or_default();
    record.chassis_id = block.chassis_id.filter(|c| !c.is_empty());
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOS_OUTPUT: &str = "\
------------------------------------------------
Local Intf: Gi1/0/1
Chassis id: aabb.cc00.1122
Port id: Gi1/0/48
Port Description: GigabitEthernet1/0/48
System Name: DIST-SW-01.corp.example.com

System Description:
Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.2(4)E10
Technical Support: http://www.cisco.com/techsupport

Time remaining: 112 seconds
System Capabilities: B,R
Enabled Capabilities: R
Management Addresses:
    IP: 192.168.1.10
Auto Negotiation - supported, enabled
Physical media capabilities:
    1000baseT(FD)

------------------------------------------------
Local Intf: Gi1/0/5
Chassis id: 0011.2233.4455
Port id: Port 1
System Name: SEP001122334455

System Description:
Cisco IP Phone 7965

System Capabilities: B,T
Enabled Capabilities: B,T
Management Addresses:
    IP: 192.168.1.100

Total entries displayed: 2
";

    #[test]
    fn test_parse_ios_detail() {
        let neighbors = parse_lldp(IOS_OUTPUT);
        assert_eq!(neighbors.len(), 2);

        let dist = &neighbors[0];
        assert_eq!(dist.local_interface, "GigabitEthernet1/0/1");
        assert_eq!(dist.remote_interface, "GigabitEthernet1/0/48");
        assert_eq!(dist.remote_hostname, "DIST-SW-01");
        assert_eq!(dist.remote_address.as_deref(), Some("192.168.1.10"));
        assert_eq!(dist.chassis_id.as_deref(), Some("aabb.cc00.1122"));
        assert_eq!(dist.capabilities, vec!["B", "R"]);
        assert_eq!(
            dist.description,
            "Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.2(4)E10 \
             Technical Support: http://www.cisco.com/techsupport"
        );
        assert!(dist.protocols.contains(Protocol::Lldp));

        let phone = &neighbors[1];
        assert_eq!(phone.remote_hostname, "SEP001122334455");
        assert_eq!(phone.remote_interface, "Port 1");
        assert_eq!(phone.description, "Cisco IP Phone 7965");
        assert_eq!(phone.remote_address.as_deref(), Some("192.168.1.100"));
    }

    #[test]
    fn test_parse_nxos_detail() {
        let output = "\
Chassis id: 00fe.c8a1.b2c3
Port id: Ethernet1/49
Local Port id: Eth1/1
Port Description: uplink
System Name: LEAF-02
System Description: Cisco Nexus Operating System (NX-OS) Software 9.3(8)
Time remaining: 105 seconds
System Capabilities: B, R
Enabled Capabilities: B, R
Management Address: 10.20.0.2
Management Address IPV6: not advertised
Vlan ID: not advertised


Chassis id: 00fe.c8a1.ffff
Port id: Ethernet1/50
Local Port id: Eth1/2
System Name: LEAF-03
System Capabilities: B, R
Management Address: not advertised
";
        let neighbors = parse_lldp(output);
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].local_interface, "Ethernet1/1");
        assert_eq!(neighbors[0].remote_interface, "Ethernet1/49");
        assert_eq!(neighbors[0].remote_address.as_deref(), Some("10.20.0.2"));
        assert!(neighbors[0].description.contains("NX-OS"));
        assert_eq!(neighbors[1].remote_hostname, "LEAF-03");
        assert_eq!(neighbors[1].remote_address, None);
    }

    #[test]
    fn test_entry_without_local_interface_dropped() {
        let output = "\
Chassis id: aabb.cc00.0001
Port id: Gi0/1
System Name: NOLOCAL
------------------------------------------------
Local Intf: Te1/1/1
Chassis id: aabb.cc00.0002
Port id: Te1/1/2
System Name: GOOD
";
        let neighbors = parse_lldp(output);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].remote_hostname, "GOOD");
        assert_eq!(neighbors[0].local_interface, "TenGigabitEthernet1/1/1");
    }

    #[test]
    fn test_port_description_fallback() {
        let output = "\
Local Intf: Gi1/0/3
Chassis id: 0a0b.0c0d.0e0f
Port id:
Port Description: eth0
";
        let neighbors = parse_lldp(output);
        assert_eq!(neighbors[0].remote_interface, "Ethernet0");
        assert!(neighbors[0].capabilities.is_empty());
        assert_eq!(neighbors[0].remote_hostname, "");
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(parse_lldp("").is_empty());
        assert!(parse_lldp("% LLDP is not enabled\n").is_empty());
        assert!(parse_lldp("Total entries displayed: 0\n").is_empty());
    }
}
