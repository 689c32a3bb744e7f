//! Neighbor observations reported by CDP and LLDP

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// Discovery protocol that reported a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// Cisco Discovery Protocol
    Cdp,
    /// Link Layer Discovery Protocol
    Lldp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cdp => "CDP",
            Self::Lldp => "LLDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of protocols that observed the same link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolSet(BTreeSet<Protocol>);

impl ProtocolSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn single(protocol: Protocol) -> Self {
        let mut set = Self::new();
        set.insert(protocol);
        set
    }

    pub fn insert(&mut self, protocol: Protocol) {
        self.0.insert(protocol);
    }

    /// Add every protocol of `other` to this set
    pub fn extend(&mut self, other: &ProtocolSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn union(&self, other: &ProtocolSet) -> Self {
        let mut set = self.clone();
        set.extend(other);
        set
    }

    pub fn contains(&self, protocol: Protocol) -> bool {
        self.0.contains(&protocol)
    }

    pub fn iter(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Protocol> for ProtocolSet {
    fn from_iter<I: IntoIterator<Item = Protocol>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Renders as `CDP`, `LLDP` or `CDP+LLDP`
impl fmt::Display for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Protocol::as_str).collect();
        f.write_str(&names.join("+"))
    }
}

/// One neighbor as seen from a local interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    /// Local interface the neighbor was seen on (canonical form)
    pub local_interface: String,
    /// Neighbor's interface facing us (canonical form)
    pub remote_interface: String,
    /// Neighbor hostname with any DNS domain removed
    pub remote_hostname: String,
    /// Neighbor management address, if advertised
    pub remote_address: Option<String>,
    /// Platform string (CDP `Platform:`)
    pub platform: String,
    /// System description (LLDP `System Description:` or CDP `Version :`)
    pub description: String,
    /// Advertised capability tokens
    pub capabilities: Vec<String>,
    /// LLDP chassis identifier
    pub chassis_id: Option<String>,
    /// Protocols that reported this neighbor
    pub protocols: ProtocolSet,
}

impl NeighborRecord {
    /// Empty record tagged with the protocol that is about to fill it
    pub fn new(protocol: Protocol) -> Self {
        Self {
            local_interface: String::new(),
            remote_interface: String::new(),
            remote_hostname: String::new(),
            remote_address: None,
            platform: String::new(),
            description: String::new(),
            capabilities: Vec::new(),
            chassis_id: None,
            protocols: ProtocolSet::single(protocol),
        }
    }

    /// Number of populated neighbor fields, used to judge which source is richer
    pub fn populated_fields(&self) -> usize {
        [
            !self.local_interface.is_empty(),
            !self.remote_interface.is_empty(),
            !self.remote_hostname.is_empty(),
            self.remote_address.is_some(),
            !self.platform.is_empty(),
            !self.description.is_empty(),
            !self.capabilities.is_empty(),
            self.chassis_id.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    /// Best human label: hostname, then address, then chassis id
    pub fn label(&self) -> &str {
        if !self.remote_hostname.is_empty() {
            &self.remote_hostname
        } else if let Some(addr) = &self.remote_address {
            addr
        } else if let Some(chassis) = &self.chassis_id {
            chassis
        } else {
            "?"
        }
    }
}

/// Split a capability string such as `Router Switch IGMP` or `B,R` into tokens
pub fn parse_capabilities(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if !token.is_empty() && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Remove the DNS domain and any trailing `(serial)` from a reported hostname
///
/// Addresses are returned unchanged.
pub fn strip_domain(name: &str) -> String {
    let name = name.trim();
    let name = match name.find('(') {
        Some(idx) if name.ends_with(')') && idx > 0 => &name[..idx],
        _ => name,
    };
    if name.parse::<IpAddr>().is_ok() {
        return name.to_string();
    }
    name.split('.').next().unwrap_or(name).to_string()
}

/// Full interface names and the abbreviations devices use for them
const INTERFACE_NAMES: &[(&str, &[&str])] = &[
    ("GigabitEthernet", &["gi", "gig"]),
    ("TenGigabitEthernet", &["te", "ten", "tengig", "tengige"]),
    ("TwoGigabitEthernet", &["tw", "two"]),
    ("TwentyFiveGigE", &["twe", "twentyfivegigabitethernet"]),
    ("FortyGigabitEthernet", &["fo", "for"]),
    ("HundredGigE", &["hu", "hundredgigabitethernet"]),
    ("FastEthernet", &["fa", "fas"]),
    ("Ethernet", &["e", "et", "eth"]),
    ("Port-channel", &["po"]),
    ("Loopback", &["lo"]),
    ("Vlan", &["vl"]),
];

/// Expand abbreviated interface names so CDP and LLDP output compare equal
///
/// `Gi1/0/1` becomes `GigabitEthernet1/0/1`. Names that do not look like
/// `<letters><digit>...` (Juniper `ge-0/0/0`, `Port 1`) are only trimmed.
pub fn canonical_interface(name: &str) -> String {
    let name = name.trim();
    let split = name
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(name.len());
    let (prefix, rest) = name.split_at(split);

    if prefix.is_empty() || !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return name.to_string();
    }

    let lower = prefix.to_ascii_lowercase();
    for (full, abbreviations) in INTERFACE_NAMES {
        if full.eq_ignore_ascii_case(prefix) || abbreviations.contains(&lower.as_str()) {
            return format!("{}{}", full, rest);
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_interface() {
        assert_eq!(canonical_interface("Gi1/0/1"), "GigabitEthernet1/0/1");
        assert_eq!(canonical_interface("GigabitEthernet1/0/1"), "GigabitEthernet1/0/1");
        assert_eq!(canonical_interface("gigabitethernet0/1"), "GigabitEthernet0/1");
        assert_eq!(canonical_interface("Te1/1/1"), "TenGigabitEthernet1/1/1");
        assert_eq!(canonical_interface("Eth1/49"), "Ethernet1/49");
        assert_eq!(canonical_interface("Po10"), "Port-channel10");
        assert_eq!(canonical_interface(" Fa0/24 "), "FastEthernet0/24");
        assert_eq!(canonical_interface("ge-0/0/0"), "ge-0/0/0");
        assert_eq!(canonical_interface("Port 1"), "Port 1");
        assert_eq!(canonical_interface("mgmt0"), "mgmt0");
        assert_eq!(canonical_interface("eth0"), "Ethernet0");
    }

    #[test]
    fn test_strip_domain() {
        assert_eq!(strip_domain("DIST-SW-01.corp.example.com"), "DIST-SW-01");
        assert_eq!(strip_domain("N9K-LEAF-1(FDO21120U8N)"), "N9K-LEAF-1");
        assert_eq!(strip_domain("10.0.0.1"), "10.0.0.1");
        assert_eq!(strip_domain("  SEP001122334455 "), "SEP001122334455");
    }

    #[test]
    fn test_parse_capabilities() {
        assert_eq!(parse_capabilities("Router Switch IGMP"), vec!["Router", "Switch", "IGMP"]);
        assert_eq!(parse_capabilities("B,R"), vec!["B", "R"]);
        assert_eq!(parse_capabilities("B, R, R"), vec!["B", "R"]);
        assert!(parse_capabilities("   ").is_empty());
    }

    #[test]
    fn test_protocol_set_display() {
        let mut set = ProtocolSet::single(Protocol::Lldp);
        assert_eq!(set.to_string(), "LLDP");
        set.insert(Protocol::Cdp);
        assert_eq!(set.to_string(), "CDP+LLDP");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_populated_fields() {
        let mut record = NeighborRecord::new(Protocol::Cdp);
        assert_eq!(record.populated_fields(), 0);
        record.local_interface = "Ethernet0".to_string();
        record.remote_address = Some("10.0.0.2".to_string());
        assert_eq!(record.populated_fields(), 2);
        assert_eq!(record.label(), "10.0.0.2");
    }
}
