//! Line helpers shared by the CDP and LLDP parsers

use std::net::IpAddr;

/// Value after `label` if `line` starts with it (ASCII case-insensitive), trimmed
pub(crate) fn after_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

/// A line made only of `-` (at least three), used between neighbor blocks
pub(crate) fn is_delimiter(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

/// Value if it is a literal IPv4/IPv6 address
pub(crate) fn address(value: &str) -> Option<String> {
    let value = value.trim();
    value.parse::<IpAddr>().ok().map(|_| value.to_string())
}

/// Append a continuation line to a space-joined text field
pub(crate) fn append(field: &mut String, line: &str) {
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(line);
}
