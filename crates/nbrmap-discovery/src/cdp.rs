//! Parser for `show cdp neighbors detail` output
//!
//! Handles the IOS, IOS-XE and NX-OS layouts. A neighbor block starts at a
//! `Device ID:` line or a dashed delimiter line; blocks without a local
//! interface are dropped.

use nbrmap_core::{canonical_interface, parse_capabilities, strip_domain, NeighborRecord, Protocol};
use tracing::{debug, warn};

use crate::text::{address, after_label, append, is_delimiter};

/// Parse CDP detail output into neighbor records, in input order
///
/// Never fails: unrecognized lines are skipped and empty input yields no records.
pub fn parse_cdp(output: &str) -> Vec<NeighborRecord> {
    let mut neighbors = Vec::new();
    let mut current: Option<NeighborRecord> = None;
    let mut in_version = false;

    for raw in output.lines() {
        let line = raw.trim();

        if line.is_empty() {
            in_version = false;
            continue;
        }

        if is_delimiter(line) {
            finish(&mut neighbors, current.take());
            in_version = false;
            continue;
        }

        if let Some(value) = after_label(line, "Device ID:") {
            finish(&mut neighbors, current.take());
            in_version = false;
            let mut record = NeighborRecord::new(Protocol::Cdp);
            record.remote_hostname = strip_domain(value);
            current = Some(record);
            continue;
        }

        let record = current.get_or_insert_with(|| NeighborRecord::new(Protocol::Cdp));

        let version = after_label(line, "Version :").or_else(|| after_label(line, "Version:"));
        if let Some(value) = version {
            in_version = true;
            if !value.is_empty() {
                append(&mut record.description, value);
            }
            continue;
        }

        if in_version {
            if after_label(line, "advertisement version").is_some() {
                in_version = false;
                continue;
            }
            append(&mut record.description, line);
            continue;
        }

        if let Some(value) = after_label(line, "IP address:")
            .or_else(|| after_label(line, "IPv4 Address:"))
            .or_else(|| after_label(line, "IPv6 address:"))
        {
            if record.remote_address.is_none() {
                record.remote_address = address(value);
            }
        } else if let Some(value) = after_label(line, "Platform:") {
            parse_platform_line(record, value);
        } else if let Some(value) = after_label(line, "Capabilities:") {
            record.capabilities = parse_capabilities(value);
        } else if let Some(value) = after_label(line, "Interface:") {
            parse_interface_line(record, value);
        } else if let Some(value) = after_label(line, "Port ID (outgoing port):") {
            record.remote_interface = canonical_interface(value);
        }
    }

    finish(&mut neighbors, current);
    debug!("Parsed {} CDP neighbors", neighbors.len());
    neighbors
}

/// `cisco WS-C3750X-48,  Capabilities: Router Switch IGMP`
fn parse_platform_line(record: &mut NeighborRecord, value: &str) {
    let lower = value.to_ascii_lowercase();
    match lower.find("capabilities:") {
        Some(idx) => {
            record.platform = value[..idx].trim().trim_end_matches(',').trim().to_string();
            record.capabilities = parse_capabilities(&value[idx + "capabilities:".len()..]);
        }
        None => record.platform = value.trim_end_matches(',').trim().to_string(),
    }
}

/// `GigabitEthernet1/0/1,  Port ID (outgoing port): GigabitEthernet1/0/48`
fn parse_interface_line(record: &mut NeighborRecord, value: &str) {
    match value.split_once(',') {
        Some((local, rest)) => {
            record.local_interface = canonical_interface(local);
            if let Some((_, remote)) = rest.rsplit_once(':') {
                record.remote_interface = canonical_interface(remote);
            }
        }
        None => record.local_interface = canonical_interface(value),
    }
}

fn finish(neighbors: &mut Vec<NeighborRecord>, record: Option<NeighborRecord>) {
    let Some(record) = record else {
        return;
    };
    if record.local_interface.is_empty() {
        if record.populated_fields() > 0 {
            warn!(neighbor = %record.label(), "Dropping CDP entry without a local interface");
        }
        return;
    }
    neighbors.push(record);
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOS_OUTPUT: &str = "\
-------------------------
Device ID: DIST-SW-01.corp.example.com
Entry address(es):
  IP address: 192.168.1.10
Platform: cisco WS-C3750X-48,  Capabilities: Router Switch IGMP
Interface: GigabitEthernet1/0/1,  Port ID (outgoing port): GigabitEthernet1/0/48
Holdtime : 145 sec

Version :
Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.2(4)E10
Technical Support: http://www.cisco.com/techsupport

advertisement version: 2
Native VLAN: 1
Duplex: full
Management address(es):
  IP address: 192.168.1.10

-------------------------
Device ID: SEP001122334455
Entry address(es):
  IP address: 192.168.1.100
Platform: Cisco IP Phone 7965,  Capabilities: Host Phone
Interface: GigabitEthernet1/0/5,  Port ID (outgoing port): Port 1
Holdtime : 160 sec
";

    #[test]
    fn test_parse_ios_detail() {
        let neighbors = parse_cdp(IOS_OUTPUT);
        assert_eq!(neighbors.len(), 2);

        let dist = &neighbors[0];
        assert_eq!(dist.remote_hostname, "DIST-SW-01");
        assert_eq!(dist.remote_address.as_deref(), Some("192.168.1.10"));
        assert_eq!(dist.platform, "cisco WS-C3750X-48");
        assert_eq!(dist.capabilities, vec!["Router", "Switch", "IGMP"]);
        assert_eq!(dist.local_interface, "GigabitEthernet1/0/1");
        assert_eq!(dist.remote_interface, "GigabitEthernet1/0/48");
        assert!(dist.description.starts_with("Cisco IOS Software, C3750E Software"));
        assert!(dist.description.ends_with("http://www.cisco.com/techsupport"));
        assert!(dist.protocols.contains(Protocol::Cdp));

        let phone = &neighbors[1];
        assert_eq!(phone.remote_hostname, "SEP001122334455");
        assert_eq!(phone.capabilities, vec!["Host", "Phone"]);
        assert_eq!(phone.remote_interface, "Port 1");
        assert!(phone.description.is_empty());
    }

    #[test]
    fn test_parse_nxos_detail() {
        let output = "\
----------------------------------------
Device ID:CORE-SW-01(FOX1234ABCD)
System Name: CORE-SW-01

Interface address(es):
    IPv4 Address: 10.10.0.1
Platform: N9K-C93180YC-EX, Capabilities: Router Switch IGMP Filtering Supports-STP-Dispute
Interface: mgmt0, Port ID (outgoing port): Ethernet1/48
Holdtime: 150 sec

Version:
Cisco Nexus Operating System (NX-OS) Software, Version 9.3(8)

Advertisement Version: 2
";
        let neighbors = parse_cdp(output);
        assert_eq!(neighbors.len(), 1);
        let core = &neighbors[0];
        assert_eq!(core.remote_hostname, "CORE-SW-01");
        assert_eq!(core.remote_address.as_deref(), Some("10.10.0.1"));
        assert_eq!(core.platform, "N9K-C93180YC-EX");
        assert_eq!(core.local_interface, "mgmt0");
        assert_eq!(core.remote_interface, "Ethernet1/48");
        assert!(core.description.contains("NX-OS"));
    }

    #[test]
    fn test_entry_without_local_interface_dropped() {
        let output = "\
Device ID: ORPHAN
  IP address: 10.0.0.9
Platform: cisco ISR4331,  Capabilities: Router
-------------------------
Device ID: GOOD
Interface: Gi0/0/1,  Port ID (outgoing port): Gi0/0/2
";
        let neighbors = parse_cdp(output);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].remote_hostname, "GOOD");
        assert_eq!(neighbors[0].local_interface, "GigabitEthernet0/0/1");
        assert_eq!(neighbors[0].remote_interface, "GigabitEthernet0/0/2");
        assert_eq!(neighbors[0].remote_address, None);
    }

    #[test]
    fn test_unavailable_address_is_none() {
        let output = "\
Device ID: AP-1
Entry address(es):
  IP address: (not available)
Interface: GigabitEthernet1/0/9,  Port ID (outgoing port): GigabitEthernet0
";
        let neighbors = parse_cdp(output);
        assert_eq!(neighbors[0].remote_address, None);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(parse_cdp("").is_empty());
        assert!(parse_cdp("% CDP is not enabled\n").is_empty());
        assert!(parse_cdp("\n\n---------\n\n").is_empty());
    }

    #[test]
    fn test_split_port_id_line() {
        let output = "\
Device ID: PE-1
Interface: GigabitEthernet0/0/0/0
Port ID (outgoing port): Te0/1/0
Platform: cisco ASR9K
Capabilities: Router
";
        let neighbors = parse_cdp(output);
        assert_eq!(neighbors[0].remote_interface, "TenGigabitEthernet0/1/0");
        assert_eq!(neighbors[0].platform, "cisco ASR9K");
        assert_eq!(neighbors[0].capabilities, vec!["Router"]);
    }
}
