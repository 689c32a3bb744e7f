//! Device family classification and crawlability
//!
//! Rules map platform and description substrings to a device family. The
//! family only tells the session layer what kind of device to expect; whether
//! a neighbor is crawled at all depends on its advertised capabilities.

use nbrmap_core::UNKNOWN_FAMILY;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierConfigError {
    #[error("Failed to read classification rules: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse classification rules: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Classification rule #{0} has an empty family name")]
    EmptyFamily(usize),
    #[error("Family name \"{0}\" is reserved for unclassified devices")]
    ReservedFamily(String),
    #[error("Family \"{0}\" is declared more than once")]
    DuplicateFamily(String),
    #[error("Rule for family \"{0}\" has no platform or description patterns")]
    NoPatterns(String),
    #[error("allowed_capabilities must list at least one capability")]
    NoCapabilities,
}

/// A single classification rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Family name reported for matching devices (e.g., "cisco_nxos")
    pub family: String,
    /// Substrings matched against the platform string
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Substrings matched against the system description
    #[serde(default)]
    pub descriptions: Vec<String>,
    /// Match priority (higher = tried first)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    10
}

impl ClassificationRule {
    pub fn new(family: &str, platforms: &[&str], descriptions: &[&str], priority: i32) -> Self {
        Self {
            family: family.to_string(),
            platforms: platforms.iter().map(|s| s.to_string()).collect(),
            descriptions: descriptions.iter().map(|s| s.to_string()).collect(),
            priority,
        }
    }

    fn has_patterns(&self) -> bool {
        self.platforms.iter().chain(&self.descriptions).any(|p| !p.trim().is_empty())
    }
}

/// Classification rules and the capability allow-list, as read from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Capability tokens that make a neighbor worth crawling
    #[serde(default = "default_allowed_capabilities")]
    pub allowed_capabilities: Vec<String>,
    /// Rules in declaration order
    #[serde(default = "default_rules", rename = "rule")]
    pub rules: Vec<ClassificationRule>,
}

fn default_allowed_capabilities() -> Vec<String> {
    ["Router", "Switch", "R", "S", "B"].iter().map(|s| s.to_string()).collect()
}

fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(
            "cisco_nxos",
            &["N9K", "N7K", "N5K", "N3K", "Nexus"],
            &["NX-OS", "Nexus Operating System"],
            90,
        ),
        ClassificationRule::new(
            "cisco_xr",
            &["ASR9K", "ASR-9", "NCS", "XRv", "CRS"],
            &["IOS XR", "IOS-XR"],
            85,
        ),
        ClassificationRule::new(
            "cisco_xe",
            &["C9200", "C9300", "C9400", "C9500", "ISR4", "ASR1", "CSR1000V", "C8000"],
            &["IOS-XE", "IOS XE"],
            80,
        ),
        ClassificationRule::new("arista_eos", &["Arista", "DCS-"], &["Arista Networks EOS"], 75),
        ClassificationRule::new(
            "juniper_junos",
            &["Juniper", "QFX", "EX2300", "EX3400", "EX4300", "SRX"],
            &["JUNOS", "Juniper Networks"],
            75,
        ),
        ClassificationRule::new(
            "cisco_ios",
            &["cisco WS-C", "Catalyst", "cisco"],
            &["Cisco IOS Software"],
            50,
        ),
    ]
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            allowed_capabilities: default_allowed_capabilities(),
            rules: default_rules(),
        }
    }
}

impl ClassifierConfig {
    /// Load rules from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ClassifierConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load rules from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ClassifierConfigError> {
        let config: ClassifierConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Check the rule set for mistakes that would make classification ambiguous
    pub fn validate(&self) -> Result<(), ClassifierConfigError> {
        if !self.allowed_capabilities.iter().any(|c| !c.trim().is_empty()) {
            return Err(ClassifierConfigError::NoCapabilities);
        }

        let mut seen = HashSet::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let family = rule.family.trim();
            if family.is_empty() {
                return Err(ClassifierConfigError::EmptyFamily(index + 1));
            }
            if family.eq_ignore_ascii_case(UNKNOWN_FAMILY) {
                return Err(ClassifierConfigError::ReservedFamily(family.to_string()));
            }
            if !seen.insert(family.to_string()) {
                return Err(ClassifierConfigError::DuplicateFamily(family.to_string()));
            }
            if !rule.has_patterns() {
                return Err(ClassifierConfigError::NoPatterns(family.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    family: String,
    platforms: Vec<String>,
    descriptions: Vec<String>,
}

fn lowered(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

impl CompiledRule {
    fn matches(&self, platform: &str, description: &str) -> bool {
        self.platforms.iter().any(|p| platform.contains(p.as_str()))
            || self.descriptions.iter().any(|p| description.contains(p.as_str()))
    }
}

/// Validated, immutable classifier built once at startup
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    /// Sorted by descending priority, declaration order within a priority
    rules: Vec<CompiledRule>,
    allowed: HashSet<String>,
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::compile(ClassifierConfig::default())
    }
}

impl DeviceClassifier {
    /// Validate `config` and build a classifier from it
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierConfigError> {
        config.validate()?;
        Ok(Self::compile(config))
    }

    /// Load, validate and build from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ClassifierConfigError> {
        Self::new(ClassifierConfig::from_file(path)?)
    }

    fn compile(config: ClassifierConfig) -> Self {
        let mut rules = config.rules;
        // Stable sort keeps declaration order for equal priorities
        rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority));

        Self {
            rules: rules
                .into_iter()
                .map(|rule| CompiledRule {
                    family: rule.family.trim().to_string(),
                    platforms: lowered(&rule.platforms),
                    descriptions: lowered(&rule.descriptions),
                })
                .collect(),
            allowed: config
                .allowed_capabilities
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// Family of the first matching rule, or `unknown`
    pub fn classify(&self, platform: &str, description: &str) -> &str {
        let platform = platform.to_lowercase();
        let description = description.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&platform, &description))
            .map(|rule| rule.family.as_str())
            .unwrap_or(UNKNOWN_FAMILY)
    }

    /// Whether any advertised capability is in the allow-list
    pub fn is_crawlable<S: AsRef<str>>(&self, capabilities: &[S]) -> bool {
        capabilities
            .iter()
            .any(|c| self.allowed.contains(&c.as_ref().trim().to_lowercase()))
    }

    /// Configured family names, highest priority first
    pub fn families(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.family.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        ClassifierConfig::default().validate().unwrap();
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.families().len(), 6);
        assert_eq!(classifier.families()[0], "cisco_nxos");
    }

    #[test]
    fn test_classify_defaults() {
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.classify("N9K-C93180YC-EX", ""), "cisco_nxos");
        assert_eq!(
            classifier.classify("cisco WS-C3750X-48", "Cisco IOS Software, C3750E Software"),
            "cisco_ios"
        );
        assert_eq!(classifier.classify("cisco C9300-48P", ""), "cisco_xe");
        assert_eq!(classifier.classify("", "Arista Networks EOS version 4.28"), "arista_eos");
        assert_eq!(classifier.classify("Juniper ex4300-48t", ""), "juniper_junos");
        assert_eq!(classifier.classify("Linux", "Ubuntu 22.04"), UNKNOWN_FAMILY);
        assert_eq!(classifier.classify("", ""), UNKNOWN_FAMILY);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let classifier = DeviceClassifier::default();
        assert_eq!(classifier.classify("n9k-c9336c-fx2", ""), "cisco_nxos");
        assert_eq!(classifier.classify("", "cisco nexus operating system"), "cisco_nxos");
    }

    #[test]
    fn test_higher_priority_wins() {
        let config = ClassifierConfig {
            allowed_capabilities: vec!["Router".to_string()],
            rules: vec![
                ClassificationRule::new("generic", &["WS-C"], &[], 10),
                ClassificationRule::new("catalyst", &["WS-C3750"], &[], 50),
            ],
        };
        let classifier = DeviceClassifier::new(config).unwrap();
        assert_eq!(classifier.classify("cisco WS-C3750X-48", ""), "catalyst");
        assert_eq!(classifier.classify("cisco WS-C2960", ""), "generic");
    }

    #[test]
    fn test_equal_priority_uses_declaration_order() {
        let config = ClassifierConfig {
            allowed_capabilities: vec!["Router".to_string()],
            rules: vec![
                ClassificationRule::new("first", &["box"], &[], 10),
                ClassificationRule::new("second", &["box"], &[], 10),
            ],
        };
        let classifier = DeviceClassifier::new(config).unwrap();
        assert_eq!(classifier.classify("Box-9000", ""), "first");
    }

    #[test]
    fn test_classify_is_pure() {
        let classifier = DeviceClassifier::default();
        let first = classifier.classify("DCS-7050SX", "").to_string();
        for _ in 0..3 {
            assert_eq!(classifier.classify("DCS-7050SX", ""), first);
        }
    }

    #[test]
    fn test_is_crawlable() {
        let classifier = DeviceClassifier::default();
        assert!(classifier.is_crawlable(&["Router", "Switch", "IGMP"]));
        assert!(classifier.is_crawlable(&["B", "T"]));
        assert!(classifier.is_crawlable(&["switch"]));
        assert!(!classifier.is_crawlable(&["Host", "Phone"]));
        assert!(!classifier.is_crawlable(&["Trans-Bridge"]));
        assert!(!classifier.is_crawlable::<&str>(&[]));
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
allowed_capabilities = ["Router", "Switch"]

[[rule]]
family = "cisco_nxos"
platforms = ["N9K"]
descriptions = ["NX-OS"]
priority = 90

[[rule]]
family = "fortinet"
descriptions = ["FortiGate"]
"#;
        let config = ClassifierConfig::from_toml(toml).unwrap();
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].priority, 10);
        assert!(config.rules[1].platforms.is_empty());

        let classifier = DeviceClassifier::new(config).unwrap();
        assert_eq!(classifier.classify("", "FortiGate-60F v7.2"), "fortinet");
        assert!(!classifier.is_crawlable(&["B"]));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = ClassifierConfig::from_toml("").unwrap();
        assert_eq!(config, ClassifierConfig::default());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "allowed_capabilities = [\"R\"]\n").unwrap();
        let classifier = DeviceClassifier::from_file(&path).unwrap();
        assert!(classifier.is_crawlable(&["R"]));

        let missing = DeviceClassifier::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ClassifierConfigError::IoError(_))));
    }

    #[test]
    fn test_validation_errors() {
        let rule = |family: &str, platforms: &[&str]| {
            ClassificationRule::new(family, platforms, &[], 10)
        };
        let config = |rules: Vec<ClassificationRule>| ClassifierConfig {
            allowed_capabilities: vec!["Router".to_string()],
            rules,
        };

        assert!(matches!(
            DeviceClassifier::new(config(vec![rule(" ", &["x"])])),
            Err(ClassifierConfigError::EmptyFamily(1))
        ));
        assert!(matches!(
            DeviceClassifier::new(config(vec![rule("Unknown", &["x"])])),
            Err(ClassifierConfigError::ReservedFamily(_))
        ));
        assert!(matches!(
            DeviceClassifier::new(config(vec![rule("a", &["x"]), rule("a", &["y"])])),
            Err(ClassifierConfigError::DuplicateFamily(_))
        ));
        assert!(matches!(
            DeviceClassifier::new(config(vec![rule("a", &["", "  "])])),
            Err(ClassifierConfigError::NoPatterns(_))
        ));

        let no_caps = ClassifierConfig {
            allowed_capabilities: vec![],
            rules: vec![rule("a", &["x"])],
        };
        assert!(matches!(
            DeviceClassifier::new(no_caps),
            Err(ClassifierConfigError::NoCapabilities)
        ));

        assert!(matches!(
            ClassifierConfig::from_toml("rule = 3"),
            Err(ClassifierConfigError::ParseError(_))
        ));
    }
}
