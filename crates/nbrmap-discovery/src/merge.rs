//! Merge CDP and LLDP observations of the same neighbors
//!
//! Two records describe the same neighbor when they share a local interface
//! and either the same management address, or at least one of them has no
//! address. Matched records are combined field by field: a populated value
//! beats an empty one, and when both are populated and differ the record
//! with more populated fields wins (the first list on a tie).

use nbrmap_core::{NeighborRecord, Protocol, ProtocolSet};
use serde::Serialize;
use tracing::warn;

/// Two sources disagreed on a field; `kept` is the value in the merged record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldConflict {
    pub local_interface: String,
    pub field: &'static str,
    pub kept: String,
    pub discarded: String,
    /// Protocols of the record the kept value came from
    pub kept_from: ProtocolSet,
}

/// Merge two neighbor lists, logging any field conflicts
pub fn merge(first: Vec<NeighborRecord>, second: Vec<NeighborRecord>) -> Vec<NeighborRecord> {
    let (merged, conflicts) = merge_with_conflicts(first, second);
    for conflict in &conflicts {
        warn!(
            interface = %conflict.local_interface,
            field = conflict.field,
            kept = %conflict.kept,
            discarded = %conflict.discarded,
            source = %conflict.kept_from,
            "Neighbor sources disagree"
        );
    }
    merged
}

/// Merge two neighbor lists and report every field conflict
///
/// Output order is the first list's order, followed by unmatched records of
/// the second list in their own order. Each record matches at most once.
pub fn merge_with_conflicts(
    first: Vec<NeighborRecord>,
    second: Vec<NeighborRecord>,
) -> (Vec<NeighborRecord>, Vec<FieldConflict>) {
    let mut merged = first;
    let mut matched = vec![false; merged.len()];
    let mut unmatched = Vec::new();
    let mut conflicts = Vec::new();

    for record in second {
        match find_match(&merged, &matched, &record) {
            Some(index) => {
                matched[index] = true;
                let placeholder = NeighborRecord::new(Protocol::Cdp);
                let base = std::mem::replace(&mut merged[index], placeholder);
                merged[index] = combine(base, record, &mut conflicts);
            }
            None => unmatched.push(record),
        }
    }

    merged.extend(unmatched);
    (merged, conflicts)
}

fn find_match(
    candidates: &[NeighborRecord],
    matched: &[bool],
    record: &NeighborRecord,
) -> Option<usize> {
    let open = |i: &usize| !matched[*i] && candidates[*i].local_interface == record.local_interface;

    // Same interface and same address first, then an address-less partner
    (0..candidates.len())
        .filter(open)
        .find(|i| match (&candidates[*i].remote_address, &record.remote_address) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        })
        .or_else(|| {
            (0..candidates.len()).filter(open).find(|i| {
                candidates[*i].remote_address.is_none() || record.remote_address.is_none()
            })
        })
}

struct Combiner<'a> {
    interface: String,
    prefer_second: bool,
    first_protocols: ProtocolSet,
    second_protocols: ProtocolSet,
    conflicts: &'a mut Vec<FieldConflict>,
}

impl Combiner<'_> {
    fn text(&mut self, field: &'static str, a: String, b: String) -> String {
        if b.is_empty() || a == b {
            return a;
        }
        if a.is_empty() {
            return b;
        }
        let (kept, discarded, kept_from) = if self.prefer_second {
            (b, a, self.second_protocols.clone())
        } else {
            (a, b, self.first_protocols.clone())
        };
        self.conflicts.push(FieldConflict {
            local_interface: self.interface.clone(),
            field,
            kept: kept.clone(),
            discarded,
            kept_from,
        });
        kept
    }

    fn optional(
        &mut self,
        field: &'static str,
        a: Option<String>,
        b: Option<String>,
    ) -> Option<String> {
        let value = self.text(field, a.unwrap_or_default(), b.unwrap_or_default());
        (!value.is_empty()).then_some(value)
    }

    /// Token lists are compared and kept whole, never mixed
    fn tokens(&mut self, field: &'static str, a: Vec<String>, b: Vec<String>) -> Vec<String> {
        self.text(field, a.join(" "), b.join(" "))
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

fn combine(
    a: NeighborRecord,
    b: NeighborRecord,
    conflicts: &mut Vec<FieldConflict>,
) -> NeighborRecord {
    let mut combiner = Combiner {
        interface: a.local_interface.clone(),
        prefer_second: b.populated_fields() > a.populated_fields(),
        first_protocols: a.protocols.clone(),
        second_protocols: b.protocols.clone(),
        conflicts,
    };

    NeighborRecord {
        remote_interface: combiner.text("remote_interface", a.remote_interface, b.remote_interface),
        remote_hostname: combiner.text("remote_hostname", a.remote_hostname, b.remote_hostname),
        remote_address: combiner.optional("remote_address", a.remote_address, b.remote_address),
        platform: combiner.text("platform", a.platform, b.platform),
        description: combiner.text("description", a.description, b.description),
        chassis_id: combiner.optional("chassis_id", a.chassis_id, b.chassis_id),
        capabilities: combiner.tokens("capabilities", a.capabilities, b.capabilities),
        protocols: a.protocols.union(&b.protocols),
        local_interface: a.local_interface,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(protocol: Protocol, local: &str, host: &str, addr: Option<&str>) -> NeighborRecord {
        let mut record = NeighborRecord::new(protocol);
        record.local_interface = local.to_string();
        record.remote_hostname = host.to_string();
        record.remote_address = addr.map(str::to_string);
        record
    }

    #[test]
    fn test_merge_same_neighbor() {
        let address = Some("192.168.1.10");
        let mut cdp = record(Protocol::Cdp, "GigabitEthernet1/0/1", "DIST-SW-01", address);
        cdp.platform = "cisco WS-C3750X-48".to_string();
        cdp.capabilities = vec!["Router".to_string(), "Switch".to_string()];
        let mut lldp = record(Protocol::Lldp, "GigabitEthernet1/0/1", "DIST-SW-01", address);
        lldp.chassis_id = Some("aabb.cc00.1122".to_string());
        lldp.capabilities = vec!["B".to_string(), "R".to_string()];

        let (merged, conflicts) = merge_with_conflicts(vec![cdp], vec![lldp]);
        assert_eq!(merged.len(), 1);
        let n = &merged[0];
        assert_eq!(n.protocols.to_string(), "CDP+LLDP");
        assert_eq!(n.platform, "cisco WS-C3750X-48");
        assert_eq!(n.chassis_id.as_deref(), Some("aabb.cc00.1122"));
        assert_eq!(n.capabilities, vec!["Router", "Switch"]);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "capabilities");
        assert_eq!(conflicts[0].kept, "Router Switch");
        assert_eq!(conflicts[0].discarded, "B R");
        assert!(conflicts[0].kept_from.contains(Protocol::Cdp));
    }

    #[test]
    fn test_phone_capabilities_not_widened_by_lldp() {
        let (local, phone) = ("GigabitEthernet1/0/5", "SEP001122334455");
        let address = Some("10.0.0.100");
        let mut cdp = record(Protocol::Cdp, local, phone, address);
        cdp.capabilities = vec!["Host".to_string(), "Phone".to_string()];
        let mut lldp = record(Protocol::Lldp, local, phone, address);
        lldp.capabilities = vec!["B".to_string(), "T".to_string()];

        let merged = merge(vec![cdp], vec![lldp]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].capabilities, vec!["Host", "Phone"]);
    }

    #[test]
    fn test_capabilities_filled_from_other_source() {
        let cdp = record(Protocol::Cdp, "Ethernet0", "A", Some("10.0.0.1"));
        let mut lldp = record(Protocol::Lldp, "Ethernet0", "A", Some("10.0.0.1"));
        lldp.capabilities = vec!["B".to_string(), "R".to_string()];

        let (merged, conflicts) = merge_with_conflicts(vec![cdp], vec![lldp]);
        assert!(conflicts.is_empty());
        assert_eq!(merged[0].capabilities, vec!["B", "R"]);
    }

    #[test]
    fn test_merge_keeps_distinct_neighbors() {
        let cdp = vec![
            record(Protocol::Cdp, "GigabitEthernet1/0/1", "A", Some("10.0.0.1")),
            record(Protocol::Cdp, "GigabitEthernet1/0/2", "B", Some("10.0.0.2")),
        ];
        let lldp = vec![
            record(Protocol::Lldp, "GigabitEthernet1/0/3", "C", Some("10.0.0.3")),
            record(Protocol::Lldp, "GigabitEthernet1/0/1", "A", Some("10.0.0.1")),
        ];

        let merged = merge(cdp, lldp);
        let hosts: Vec<&str> = merged.iter().map(|n| n.remote_hostname.as_str()).collect();
        assert_eq!(hosts, vec!["A", "B", "C"]);
        assert_eq!(merged[0].protocols.len(), 2);
        assert_eq!(merged[2].protocols.to_string(), "LLDP");
    }

    #[test]
    fn test_same_interface_different_address_not_merged() {
        let cdp = vec![record(Protocol::Cdp, "Ethernet0", "A", Some("10.0.0.1"))];
        let lldp = vec![record(Protocol::Lldp, "Ethernet0", "B", Some("10.0.0.2"))];
        assert_eq!(merge(cdp, lldp).len(), 2);
    }

    #[test]
    fn test_missing_address_filled_from_other_source() {
        let cdp = vec![record(Protocol::Cdp, "Ethernet0", "A", None)];
        let lldp = vec![record(Protocol::Lldp, "Ethernet0", "A", Some("10.0.0.1"))];
        let merged = merge(cdp, lldp);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].remote_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_conflict_prefers_richer_record() {
        let cdp = record(Protocol::Cdp, "Ethernet0", "core-a", Some("10.0.0.1"));
        let mut lldp = record(Protocol::Lldp, "Ethernet0", "CORE-A", Some("10.0.0.1"));
        lldp.chassis_id = Some("0011.2233.4455".to_string());
        lldp.description = "Arista Networks EOS".to_string();

        let (merged, conflicts) = merge_with_conflicts(vec![cdp], vec![lldp]);
        assert_eq!(merged[0].remote_hostname, "CORE-A");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "remote_hostname");
        assert_eq!(conflicts[0].discarded, "core-a");
        assert!(conflicts[0].kept_from.contains(Protocol::Lldp));
    }

    #[test]
    fn test_conflict_tie_prefers_first() {
        let cdp = record(Protocol::Cdp, "Ethernet0", "core-a", Some("10.0.0.1"));
        let lldp = record(Protocol::Lldp, "Ethernet0", "CORE-A", Some("10.0.0.1"));
        let (merged, conflicts) = merge_with_conflicts(vec![cdp], vec![lldp]);
        assert_eq!(merged[0].remote_hostname, "core-a");
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn test_each_record_matches_once() {
        let cdp = vec![record(Protocol::Cdp, "Ethernet0", "A", None)];
        let lldp = vec![
            record(Protocol::Lldp, "Ethernet0", "A", None),
            record(Protocol::Lldp, "Ethernet0", "A2", None),
        ];
        let merged = merge(cdp, lldp);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].remote_hostname, "A2");
    }

    #[test]
    fn test_merge_empty_sides() {
        let one = vec![record(Protocol::Lldp, "Ethernet0", "A", None)];
        assert_eq!(merge(Vec::new(), one.clone()), one);
        assert_eq!(merge(one.clone(), Vec::new()), one);
        assert!(merge(Vec::new(), Vec::new()).is_empty());
    }
}
