//! Configuration loading and validation

use anyhow::{Context, Result};
use nbrmap_discovery::{ClassifierConfig, CommandSet, EngineConfig, OpenSshProvider, SshOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub ssh: SshOptions,
    #[serde(default)]
    pub classification: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the REST API
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Deepest level recorded; the seed is level 0
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-command limit
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Family assumed for the seed when none is given
    #[serde(default = "default_family")]
    pub default_family: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            max_sessions: default_max_sessions(),
            default_family: default_family(),
        }
    }
}

fn default_max_depth() -> u32 {
    3
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_command_timeout() -> u64 {
    30
}

fn default_max_sessions() -> usize {
    4
}

fn default_family() -> String {
    "cisco_ios".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Empty disables CDP
    #[serde(default = "default_cdp_command")]
    pub cdp: String,
    /// Empty disables LLDP
    #[serde(default = "default_lldp_command")]
    pub lldp: String,
    #[serde(default = "default_hostname_command")]
    pub hostname: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            cdp: default_cdp_command(),
            lldp: default_lldp_command(),
            hostname: default_hostname_command(),
        }
    }
}

fn default_cdp_command() -> String {
    CommandSet::default().cdp
}

fn default_lldp_command() -> String {
    CommandSet::default().lldp
}

fn default_hostname_command() -> String {
    "show running-config | include ^hostname".to_string()
}

impl Config {
    /// Convert to the engine's limits
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_depth: self.discovery.max_depth,
            connect_timeout: Duration::from_secs(self.discovery.connect_timeout_secs),
            command_timeout: Duration::from_secs(self.discovery.command_timeout_secs),
            max_sessions: self.discovery.max_sessions.max(1),
            commands: CommandSet {
                cdp: self.commands.cdp.clone(),
                lldp: self.commands.lldp.clone(),
            },
        }
    }

    /// Build the OpenSSH session provider
    pub fn ssh_provider(&self) -> OpenSshProvider {
        OpenSshProvider::new(
            self.ssh.clone(),
            self.commands.hostname.clone(),
            Duration::from_secs(self.discovery.command_timeout_secs),
        )
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
