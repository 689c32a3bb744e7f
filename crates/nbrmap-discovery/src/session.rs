//! Device session abstraction
//!
//! The crawl engine only talks to devices through these traits. A provider
//! opens one authenticated session per device; the session runs commands,
//! reports the device's own hostname, and is closed by the engine on every
//! exit path.

use async_trait::async_trait;
use nbrmap_core::DeviceAddr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Login credentials for a device
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    /// Password; `None` means key or agent authentication
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password: password.filter(|p| !p.is_empty()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What a provider needs to open a session
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub address: DeviceAddr,
    /// Family the device is assumed to be
    pub family: String,
    pub credentials: Credentials,
}

/// Failure to establish a session; fatal only for the seed device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("{address} is unreachable: {reason}")]
    Unreachable { address: DeviceAddr, reason: String },
    #[error("Authentication failed for {address}")]
    AuthFailed { address: DeviceAddr },
    #[error("Connection to {address} timed out after {timeout:?}")]
    Timeout { address: DeviceAddr, timeout: Duration },
}

impl ConnectionError {
    pub fn unreachable(address: &DeviceAddr, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            address: address.clone(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single command on a live session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command `{command}` failed: {reason}")]
    Failed { command: String, reason: String },
    #[error("Command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// Opens sessions to devices
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(
        &self,
        target: &SessionTarget,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Session>, ConnectionError>;
}

/// A live, authenticated session to one device
#[async_trait]
pub trait Session: Send {
    /// Run a command and return its raw text output
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, CommandError>;

    /// The device's own hostname, falling back to its address
    async fn resolve_hostname(&mut self) -> String;

    /// Release the session; calling it more than once is a no-op
    async fn close(&mut self);
}
