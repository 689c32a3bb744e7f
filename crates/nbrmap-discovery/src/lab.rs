//! In-memory lab network of scripted devices
//!
//! Each lab device answers the CDP and LLDP queries with canned output and
//! can be told to refuse connections, reject credentials, fail or hang. The
//! provider keeps session statistics so callers can check that every session
//! opened was also closed.

use async_trait::async_trait;
use nbrmap_core::DeviceAddr;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::session::{CommandError, ConnectionError, Session, SessionProvider, SessionTarget};

/// Seed address of the demo lab
pub const DEMO_SEED: &str = "192.168.1.1";

/// How a lab device answers a connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    Accept,
    Refuse(String),
    RejectCredentials,
    Timeout,
    /// Never answer; the caller's timeout has to fire
    Hang,
}

/// How a lab device answers one neighbor query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBehavior {
    Output(String),
    Fail(String),
    Timeout,
    /// Never answer; the caller's timeout has to fire
    Hang,
}

/// A scripted device
#[derive(Debug, Clone)]
pub struct LabDevice {
    pub hostname: String,
    pub connect: ConnectBehavior,
    pub cdp: CommandBehavior,
    pub lldp: CommandBehavior,
    /// Delay between opening a session and it becoming usable
    pub latency: Duration,
}

impl LabDevice {
    /// A reachable device with no neighbors
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            connect: ConnectBehavior::Accept,
            cdp: CommandBehavior::Output(String::new()),
            lldp: CommandBehavior::Output(String::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_cdp(mut self, output: impl Into<String>) -> Self {
        self.cdp = CommandBehavior::Output(output.into());
        self
    }

    pub fn with_lldp(mut self, output: impl Into<String>) -> Self {
        self.lldp = CommandBehavior::Output(output.into());
        self
    }

    pub fn with_cdp_behavior(mut self, behavior: CommandBehavior) -> Self {
        self.cdp = behavior;
        self
    }

    pub fn with_lldp_behavior(mut self, behavior: CommandBehavior) -> Self {
        self.lldp = behavior;
        self
    }

    pub fn with_connect(mut self, behavior: ConnectBehavior) -> Self {
        self.connect = behavior;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Session bookkeeping across the whole lab
#[derive(Debug, Clone, Default)]
pub struct LabStats {
    /// Addresses of sessions opened, in order
    pub opened: Vec<DeviceAddr>,
    pub closed: usize,
    /// Sessions currently open
    pub open_now: usize,
    /// Highest number of sessions open at the same time
    pub max_concurrent: usize,
    /// Commands run, with the device they ran on
    pub commands: Vec<(DeviceAddr, String)>,
}

/// Session provider backed by scripted devices
#[derive(Debug, Default)]
pub struct LabProvider {
    devices: HashMap<DeviceAddr, LabDevice>,
    stats: Arc<Mutex<LabStats>>,
}

fn lock(stats: &Mutex<LabStats>) -> MutexGuard<'_, LabStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LabProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device at `address`
    pub fn with_device(mut self, address: impl Into<DeviceAddr>, device: LabDevice) -> Self {
        self.insert(address, device);
        self
    }

    pub fn insert(&mut self, address: impl Into<DeviceAddr>, device: LabDevice) {
        self.devices.insert(address.into(), device);
    }

    pub fn device(&self, address: &DeviceAddr) -> Option<&LabDevice> {
        self.devices.get(address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Snapshot of the session statistics
    pub fn stats(&self) -> LabStats {
        lock(&self.stats).clone()
    }
}

#[async_trait]
impl SessionProvider for LabProvider {
    async fn open(
        &self,
        target: &SessionTarget,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Session>, ConnectionError> {
        let Some(device) = self.devices.get(&target.address) else {
            return Err(ConnectionError::unreachable(&target.address, "no route to host"));
        };

        match &device.connect {
            ConnectBehavior::Accept => {}
            ConnectBehavior::Refuse(reason) => {
                return Err(ConnectionError::unreachable(&target.address, reason.clone()));
            }
            ConnectBehavior::RejectCredentials => {
                return Err(ConnectionError::AuthFailed {
                    address: target.address.clone(),
                });
            }
            ConnectBehavior::Timeout => {
                return Err(ConnectionError::Timeout {
                    address: target.address.clone(),
                    timeout: connect_timeout,
                });
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }

        // A session is counted only once established
        if device.latency > connect_timeout {
            tokio::time::sleep(connect_timeout).await;
            return Err(ConnectionError::Timeout {
                address: target.address.clone(),
                timeout: connect_timeout,
            });
        }
        if !device.latency.is_zero() {
            tokio::time::sleep(device.latency).await;
        }

        {
            let mut stats = lock(&self.stats);
            stats.opened.push(target.address.clone());
            stats.open_now += 1;
            stats.max_concurrent = stats.max_concurrent.max(stats.open_now);
        }
        debug!(address = %target.address, hostname = %device.hostname, "Lab session opened");

        let session = LabSession {
            address: target.address.clone(),
            device: device.clone(),
            stats: self.stats.clone(),
            closed: false,
        };
        Ok(Box::new(session))
    }
}

struct LabSession {
    address: DeviceAddr,
    device: LabDevice,
    stats: Arc<Mutex<LabStats>>,
    closed: bool,
}

#[async_trait]
impl Session for LabSession {
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, CommandError> {
        lock(&self.stats)
            .commands
            .push((self.address.clone(), command.to_string()));

        let lower = command.to_lowercase();
        let behavior = if lower.contains("cdp") {
            &self.device.cdp
        } else if lower.contains("lldp") {
            &self.device.lldp
        } else {
            return Err(CommandError::Failed {
                command: command.to_string(),
                reason: "% Invalid input detected".to_string(),
            });
        };

        match behavior {
            CommandBehavior::Output(output) => Ok(output.clone()),
            CommandBehavior::Fail(reason) => Err(CommandError::Failed {
                command: command.to_string(),
                reason: reason.clone(),
            }),
            CommandBehavior::Timeout => Err(CommandError::Timeout {
                command: command.to_string(),
                timeout,
            }),
            CommandBehavior::Hang => std::future::pending().await,
        }
    }

    async fn resolve_hostname(&mut self) -> String {
        if self.device.hostname.is_empty() {
            self.address.to_string()
        } else {
            self.device.hostname.clone()
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut stats = lock(&self.stats);
        stats.closed += 1;
        stats.open_now = stats.open_now.saturating_sub(1);
        debug!(address = %self.address, "Lab session closed");
    }
}

/// Seven-device campus lab: a core switch, two distribution switches, two
/// access switches, an IP phone and an access point
pub fn demo_lab() -> LabProvider {
    LabProvider::new()
        .with_device(
            DEMO_SEED,
            LabDevice::new("CORE-SW-01")
                .with_cdp(include_str!("../fixtures/lab/core-sw-01-cdp.txt"))
                .with_lldp(include_str!("../fixtures/lab/core-sw-01-lldp.txt")),
        )
        .with_device(
            "192.168.1.10",
            LabDevice::new("DIST-SW-01")
                .with_cdp(include_str!("../fixtures/lab/dist-sw-01-cdp.txt"))
                .with_lldp(include_str!("../fixtures/lab/dist-sw-01-lldp.txt")),
        )
        .with_device(
            "192.168.1.11",
            LabDevice::new("DIST-SW-02")
                .with_cdp(include_str!("../fixtures/lab/dist-sw-02-cdp.txt"))
                .with_lldp(include_str!("../fixtures/lab/dist-sw-02-lldp.txt")),
        )
        .with_device(
            "192.168.1.20",
            LabDevice::new("ACCESS-SW-01")
                .with_cdp(include_str!("../fixtures/lab/access-sw-01-cdp.txt"))
                .with_lldp(include_str!("../fixtures/lab/access-sw-01-lldp.txt")),
        )
        .with_device(
            "192.168.1.21",
            LabDevice::new("ACCESS-SW-02")
                .with_cdp(include_str!("../fixtures/lab/access-sw-02-cdp.txt")),
        )
        .with_device(
            "192.168.1.100",
            LabDevice::new("SEP001122334455")
                .with_cdp(include_str!("../fixtures/lab/sep001122334455-cdp.txt")),
        )
        .with_device(
            "192.168.1.50",
            LabDevice::new("AP-OFFICE-01")
                .with_cdp(include_str!("../fixtures/lab/ap-office-01-cdp.txt")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;

    fn target(addr: &str) -> SessionTarget {
        SessionTarget {
            address: addr.into(),
            family: "cisco_ios".to_string(),
            credentials: Credentials::new("admin", None),
        }
    }

    #[tokio::test]
    async fn test_lab_session_lifecycle() {
        let lab = LabProvider::new()
            .with_device("10.0.0.1", LabDevice::new("r1").with_cdp("cdp text"));
        let mut session = lab.open(&target("10.0.0.1"), Duration::from_secs(1)).await.unwrap();

        assert_eq!(session.resolve_hostname().await, "r1");
        let out = session
            .run("show cdp neighbors detail", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, "cdp text");
        assert_eq!(
            session.run("show lldp neighbors detail", Duration::from_secs(1)).await.unwrap(),
            ""
        );
        assert!(session.run("show version", Duration::from_secs(1)).await.is_err());

        session.close().await;
        session.close().await;

        let stats = lab.stats();
        assert_eq!(stats.opened.len(), 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.open_now, 0);
        assert_eq!(stats.commands.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_connect_is_not_counted_as_open() {
        let lab = LabProvider::new()
            .with_device("10.0.0.1", LabDevice::new("slow").with_latency(Duration::from_secs(10)))
            .with_device("10.0.0.2", LabDevice::new("steady").with_latency(Duration::from_secs(2)));

        let result = lab.open(&target("10.0.0.1"), Duration::from_secs(3)).await;
        assert!(matches!(result, Err(ConnectionError::Timeout { .. })));

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            lab.open(&target("10.0.0.2"), Duration::from_secs(3)),
        )
        .await;
        assert!(abandoned.is_err());

        let stats = lab.stats();
        assert!(stats.opened.is_empty());
        assert_eq!(stats.open_now, 0);
        assert_eq!(stats.max_concurrent, 0);

        let mut session = lab.open(&target("10.0.0.2"), Duration::from_secs(3)).await.unwrap();
        assert_eq!(lab.stats().open_now, 1);
        session.close().await;
        assert_eq!(lab.stats().open_now, 0);
    }

    #[tokio::test]
    async fn test_lab_connect_failures() {
        let lab = LabProvider::new()
            .with_device(
                "10.0.0.2",
                LabDevice::new("r2").with_connect(ConnectBehavior::RejectCredentials),
            )
            .with_device(
                "10.0.0.3",
                LabDevice::new("r3")
                    .with_connect(ConnectBehavior::Refuse("connection refused".to_string())),
            );

        assert!(matches!(
            lab.open(&target("10.0.0.2"), Duration::from_secs(1)).await,
            Err(ConnectionError::AuthFailed { .. })
        ));
        assert!(matches!(
            lab.open(&target("10.0.0.3"), Duration::from_secs(1)).await,
            Err(ConnectionError::Unreachable { .. })
        ));
        assert!(matches!(
            lab.open(&target("10.9.9.9"), Duration::from_secs(1)).await,
            Err(ConnectionError::Unreachable { .. })
        ));
        assert!(lab.stats().opened.is_empty());
    }

    #[test]
    fn test_demo_lab_fixtures_parse() {
        let lab = demo_lab();
        assert_eq!(lab.len(), 7);

        let dist = lab.device(&"192.168.1.10".into()).unwrap();
        let CommandBehavior::Output(cdp) = &dist.cdp else {
            panic!("expected canned CDP output");
        };
        let neighbors = crate::cdp::parse_cdp(cdp);
        assert_eq!(neighbors.len(), 5);
        assert_eq!(neighbors[3].remote_hostname, "SEP001122334455");
    }
}
