//! Breadth-first crawl of a network from a seed device
//!
//! A single coordinator owns the visited set and the topology. The frontier
//! is processed one depth level at a time: every task of a level is handed to
//! a worker in a `JoinSet`, bounded by a semaphore of `max_sessions` permits.
//! Workers only talk to devices and send back a `DeviceReport`; the
//! coordinator applies reports in frontier order, so the resulting topology
//! does not depend on which session finished first.

use chrono::{DateTime, Utc};
use nbrmap_core::{
    render, Device, DeviceAddr, DeviceStatus, LeafReason, Link, NeighborRecord, Protocol, Topology,
    TopologySummary,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::cdp::parse_cdp;
use crate::classifier::DeviceClassifier;
use crate::lldp::parse_lldp;
use crate::merge::merge;
use crate::session::{
    CommandError, ConnectionError, Credentials, Session, SessionProvider, SessionTarget,
};

/// Time a provider gets past its own timeout before the engine cuts it off
const PROVIDER_GRACE: Duration = Duration::from_secs(2);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CAPACITY: usize = 256;

/// Commands sent to every crawled device; an empty command disables that protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSet {
    #[serde(default = "default_cdp_command")]
    pub cdp: String,
    #[serde(default = "default_lldp_command")]
    pub lldp: String,
}

fn default_cdp_command() -> String {
    "show cdp neighbors detail".to_string()
}

fn default_lldp_command() -> String {
    "show lldp neighbors detail".to_string()
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            cdp: default_cdp_command(),
            lldp: default_lldp_command(),
        }
    }
}

/// Engine limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deepest level at which devices are recorded (seed is 0)
    pub max_depth: u32,
    pub connect_timeout: Duration,
    /// Limit for each individual command
    pub command_timeout: Duration,
    /// Sessions open at the same time; 1 crawls strictly one device at a time
    pub max_sessions: usize,
    pub commands: CommandSet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(30),
            max_sessions: 4,
            commands: CommandSet::default(),
        }
    }
}

/// Where and how to start a crawl
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub seed: DeviceAddr,
    /// Family the seed is assumed to be
    pub family: String,
    pub credentials: Credentials,
    /// Overrides `EngineConfig::max_depth` for this run
    pub max_depth: Option<u32>,
}

impl DiscoveryRequest {
    pub fn new(
        seed: impl Into<DeviceAddr>,
        family: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            seed: seed.into(),
            family: family.into(),
            credentials,
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    /// Cancelled before the frontier drained
    Aborted,
}

/// Progress of a single device task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Pending,
    Connecting,
    Querying,
    Parsing,
    Expanding,
    Done,
}

/// Discovery event for real-time updates
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    RunStarted {
        run_id: Uuid,
        seed: DeviceAddr,
        max_depth: u32,
    },
    Phase {
        address: DeviceAddr,
        depth: u32,
        phase: TaskPhase,
    },
    /// Device crawled successfully
    DeviceDiscovered {
        address: DeviceAddr,
        hostname: String,
        depth: u32,
        neighbors: usize,
    },
    DeviceUnreachable {
        address: DeviceAddr,
        depth: u32,
        error: String,
    },
    RunFinished {
        run_id: Uuid,
        state: RunState,
        summary: TopologySummary,
    },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Seed device {address} could not be reached: {source}")]
    SeedUnreachable {
        address: DeviceAddr,
        #[source]
        source: ConnectionError,
    },
    #[error("Discovery was cancelled before the seed device was crawled")]
    Cancelled,
}

/// Requests cancellation of running discoveries
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Token observing this handle
    pub fn token(&self) -> CancelToken {
        CancelToken { rx: self.tx.subscribe() }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Checked by the engine before each level and each dispatched task
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Result of one crawl
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryOutcome {
    pub run_id: Uuid,
    pub state: RunState,
    pub topology: Topology,
    /// Addresses in the order they entered the visited set
    pub visited: Vec<DeviceAddr>,
    pub summary: TopologySummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DiscoveryOutcome {
    /// Text tree of the topology from the seed
    pub fn render(&self) -> String {
        render(&self.topology)
    }
}

#[derive(Debug, Clone)]
struct DiscoveryTask {
    address: DeviceAddr,
    family: String,
    depth: u32,
}

#[derive(Debug)]
struct DeviceData {
    hostname: String,
    neighbors: Vec<NeighborRecord>,
}

/// What a worker learned about one device
#[derive(Debug)]
struct DeviceReport {
    /// Position in the frontier the task came from
    index: usize,
    task: DiscoveryTask,
    result: Result<DeviceData, ConnectionError>,
}

/// Device-facing half of the engine, cloned into every worker task
#[derive(Clone)]
struct Worker {
    provider: Arc<dyn SessionProvider>,
    config: Arc<EngineConfig>,
    credentials: Credentials,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl Worker {
    async fn visit(&self, index: usize, task: DiscoveryTask) -> DeviceReport {
        let result = self.crawl_device(&task).await;
        DeviceReport { index, task, result }
    }

    async fn crawl_device(&self, task: &DiscoveryTask) -> Result<DeviceData, ConnectionError> {
        self.phase(task, TaskPhase::Connecting);
        let target = SessionTarget {
            address: task.address.clone(),
            family: task.family.clone(),
            credentials: self.credentials.clone(),
        };
        let connect_timeout = self.config.connect_timeout;

        let open = self.provider.open(&target, connect_timeout);
        let mut session = match timeout(connect_timeout + PROVIDER_GRACE, open).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    address: task.address.clone(),
                    timeout: connect_timeout,
                })
            }
        };

        let data = self.query(session.as_mut(), task).await;

        if timeout(CLOSE_TIMEOUT, session.close()).await.is_err() {
            warn!(address = %task.address, "Closing session timed out");
        }
        self.phase(task, TaskPhase::Done);
        Ok(data)
    }

    async fn query(&self, session: &mut dyn Session, task: &DiscoveryTask) -> DeviceData {
        self.phase(task, TaskPhase::Querying);

        let limit = self.config.command_timeout;
        let hostname = match timeout(limit + PROVIDER_GRACE, session.resolve_hostname()).await {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            Ok(_) => task.address.to_string(),
            Err(_) => {
                warn!(address = %task.address, "Hostname lookup timed out, using address");
                task.address.to_string()
            }
        };

        let commands = &self.config.commands;
        let cdp_output = self.run_command(session, task, Protocol::Cdp, &commands.cdp).await;
        let lldp_output = self.run_command(session, task, Protocol::Lldp, &commands.lldp).await;

        self.phase(task, TaskPhase::Parsing);
        let cdp = cdp_output.map(|output| parse_cdp(&output)).unwrap_or_default();
        let lldp = lldp_output.map(|output| parse_lldp(&output)).unwrap_or_default();
        debug!(
            address = %task.address,
            cdp = cdp.len(),
            lldp = lldp.len(),
            "Collected neighbor records"
        );

        DeviceData {
            hostname,
            neighbors: merge(cdp, lldp),
        }
    }

    /// Run one neighbor query; any failure counts as zero neighbors for that protocol
    async fn run_command(
        &self,
        session: &mut dyn Session,
        task: &DiscoveryTask,
        protocol: Protocol,
        command: &str,
    ) -> Option<String> {
        if command.trim().is_empty() {
            return None;
        }

        let limit = self.config.command_timeout;
        let result = match timeout(limit + PROVIDER_GRACE, session.run(command, limit)).await {
            Ok(result) => result,
            Err(_) => Err(CommandError::Timeout {
                command: command.to_string(),
                timeout: limit,
            }),
        };

        match result {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(
                    address = %task.address,
                    protocol = %protocol,
                    error = %e,
                    "Neighbor query failed, treating as no neighbors"
                );
                None
            }
        }
    }

    fn phase(&self, task: &DiscoveryTask, phase: TaskPhase) {
        trace!(address = %task.address, depth = task.depth, phase = ?phase, "Task phase");
        let _ = self.events.send(DiscoveryEvent::Phase {
            address: task.address.clone(),
            depth: task.depth,
            phase,
        });
    }
}

/// Coordinator-owned state of one run
struct Crawl<'a> {
    classifier: &'a DeviceClassifier,
    events: &'a broadcast::Sender<DiscoveryEvent>,
    max_depth: u32,
    topology: Topology,
    visited: HashSet<DeviceAddr>,
    visit_order: Vec<DeviceAddr>,
}

impl<'a> Crawl<'a> {
    fn new(
        classifier: &'a DeviceClassifier,
        events: &'a broadcast::Sender<DiscoveryEvent>,
        max_depth: u32,
    ) -> Self {
        Self {
            classifier,
            events,
            max_depth,
            topology: Topology::new(),
            visited: HashSet::new(),
            visit_order: Vec::new(),
        }
    }

    /// Insert into the visited set; `false` if the address was already there
    fn mark_visited(&mut self, address: &DeviceAddr) -> bool {
        if self.visited.insert(address.clone()) {
            self.visit_order.push(address.clone());
            true
        } else {
            false
        }
    }

    fn apply(&mut self, report: DeviceReport) -> Vec<DiscoveryTask> {
        let DeviceReport { task, result, .. } = report;
        match result {
            Err(error) => {
                warn!(
                    address = %task.address,
                    depth = task.depth,
                    error = %error,
                    "Device unreachable"
                );
                if let Some(device) = self.topology.get_mut(&task.address) {
                    device.status = DeviceStatus::Unreachable {
                        error: error.to_string(),
                    };
                }
                let _ = self.events.send(DiscoveryEvent::DeviceUnreachable {
                    address: task.address,
                    depth: task.depth,
                    error: error.to_string(),
                });
                Vec::new()
            }
            Ok(data) => {
                if let Some(device) = self.topology.get_mut(&task.address) {
                    device.hostname = data.hostname.clone();
                    device.status = DeviceStatus::Crawled;
                }
                info!(
                    address = %task.address,
                    hostname = %data.hostname,
                    depth = task.depth,
                    neighbors = data.neighbors.len(),
                    "Device crawled"
                );
                let _ = self.events.send(DiscoveryEvent::DeviceDiscovered {
                    address: task.address.clone(),
                    hostname: data.hostname,
                    depth: task.depth,
                    neighbors: data.neighbors.len(),
                });
                let _ = self.events.send(DiscoveryEvent::Phase {
                    address: task.address.clone(),
                    depth: task.depth,
                    phase: TaskPhase::Expanding,
                });
                self.expand(&task.address, task.depth, data.neighbors)
            }
        }
    }

    /// Attach links for every neighbor and return the tasks for the next level
    fn expand(
        &mut self,
        owner: &DeviceAddr,
        depth: u32,
        neighbors: Vec<NeighborRecord>,
    ) -> Vec<DiscoveryTask> {
        let mut next = Vec::new();

        for record in neighbors {
            let family = self
                .classifier
                .classify(&record.platform, &record.description)
                .to_string();
            let crawlable = self.classifier.is_crawlable(&record.capabilities);
            self.topology.add_link(owner, Link::from_record(&record));

            let Some(address) = record.remote_address.as_deref().map(DeviceAddr::new) else {
                debug!(
                    owner = %owner,
                    neighbor = %record.label(),
                    "Neighbor has no management address"
                );
                continue;
            };

            let child_depth = depth + 1;
            if child_depth > self.max_depth {
                trace!(address = %address, depth = child_depth, "Neighbor beyond max depth");
                continue;
            }

            if !self.topology.contains(&address) {
                let mut device = Device::new(
                    address.clone(),
                    record.remote_hostname.clone(),
                    family.clone(),
                    record.platform.clone(),
                    child_depth,
                );
                if !crawlable {
                    device.status = DeviceStatus::Leaf {
                        reason: LeafReason::NotCrawlable,
                    };
                }
                self.topology.insert_device(device);
            }

            if !crawlable {
                debug!(
                    address = %address,
                    capabilities = ?record.capabilities,
                    "Neighbor not crawlable, recorded as leaf"
                );
                continue;
            }

            if !self.mark_visited(&address) {
                trace!(address = %address, "Neighbor already visited");
                continue;
            }

            // Seen earlier as a leaf through a neighbor with fewer capabilities
            if let Some(device) = self.topology.get_mut(&address) {
                if device.status.is_leaf() {
                    device.status = DeviceStatus::Queued;
                }
            }

            debug!(address = %address, family = %family, depth = child_depth, "Neighbor queued");
            let task = DiscoveryTask {
                address,
                family,
                depth: child_depth,
            };
            let _ = self.events.send(DiscoveryEvent::Phase {
                address: task.address.clone(),
                depth: task.depth,
                phase: TaskPhase::Pending,
            });
            next.push(task);
        }

        next
    }

    fn mark_cancelled(&mut self, tasks: &[DiscoveryTask]) {
        for task in tasks {
            if let Some(device) = self.topology.get_mut(&task.address) {
                if device.status == DeviceStatus::Queued {
                    device.status = DeviceStatus::Leaf {
                        reason: LeafReason::Cancelled,
                    };
                }
            }
        }
    }
}

/// Crawls a network from a seed device over a `SessionProvider`
pub struct DiscoveryEngine {
    provider: Arc<dyn SessionProvider>,
    classifier: Arc<DeviceClassifier>,
    config: Arc<EngineConfig>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
}

impl DiscoveryEngine {
    /// Create an engine with its own event channel
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        classifier: Arc<DeviceClassifier>,
        config: EngineConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self::with_events(provider, classifier, config, event_tx)
    }

    /// Create an engine that reports on an existing event channel
    pub fn with_events(
        provider: Arc<dyn SessionProvider>,
        classifier: Arc<DeviceClassifier>,
        config: EngineConfig,
        event_tx: broadcast::Sender<DiscoveryEvent>,
    ) -> Self {
        Self {
            provider,
            classifier,
            config: Arc::new(config),
            event_tx,
        }
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Crawl from the seed until the frontier is empty
    pub async fn discover(
        &self,
        request: DiscoveryRequest,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        self.discover_with_cancel(request, CancelToken::never()).await
    }

    /// Crawl from the seed, stopping early once `cancel` fires
    ///
    /// Cancellation is checked before each level and before each task is
    /// dispatched; sessions already open run to completion.
    pub async fn discover_with_cancel(
        &self,
        request: DiscoveryRequest,
        cancel: CancelToken,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let max_depth = request.max_depth.unwrap_or(self.config.max_depth);

        info!(
            run = %run_id,
            seed = %request.seed,
            family = %request.family,
            max_depth,
            max_sessions = self.config.max_sessions,
            "Starting discovery"
        );
        let _ = self.event_tx.send(DiscoveryEvent::RunStarted {
            run_id,
            seed: request.seed.clone(),
            max_depth,
        });

        if cancel.is_cancelled() {
            info!(run = %run_id, "Discovery cancelled before start");
            self.finish_event(run_id, RunState::Aborted, TopologySummary::default());
            return Err(DiscoveryError::Cancelled);
        }

        let worker = Worker {
            provider: self.provider.clone(),
            config: self.config.clone(),
            credentials: request.credentials.clone(),
            events: self.event_tx.clone(),
        };
        let mut crawl = Crawl::new(&self.classifier, &self.event_tx, max_depth);

        let seed = DiscoveryTask {
            address: request.seed.clone(),
            family: request.family.clone(),
            depth: 0,
        };
        crawl.mark_visited(&seed.address);
        crawl
            .topology
            .insert_device(Device::new(seed.address.clone(), "", seed.family.clone(), "", 0));
        crawl.topology.set_root(seed.address.clone());

        let report = worker.visit(0, seed).await;
        if let Err(error) = &report.result {
            warn!(
                run = %run_id,
                seed = %request.seed,
                error = %error,
                "Seed device unreachable, aborting"
            );
            self.finish_event(run_id, RunState::Aborted, TopologySummary::default());
            return Err(DiscoveryError::SeedUnreachable {
                address: request.seed,
                source: error.clone(),
            });
        }

        let mut state = RunState::Completed;
        let mut frontier = crawl.apply(report);

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                info!(run = %run_id, remaining = frontier.len(), "Discovery cancelled");
                crawl.mark_cancelled(&frontier);
                state = RunState::Aborted;
                break;
            }

            debug!(depth = frontier[0].depth, tasks = frontier.len(), "Crawling level");
            let (reports, skipped) = self.run_level(&worker, frontier, &cancel).await;

            let mut next = Vec::new();
            for report in reports {
                next.extend(crawl.apply(report));
            }
            if !skipped.is_empty() {
                crawl.mark_cancelled(&skipped);
                state = RunState::Aborted;
            }
            frontier = next;
        }

        let summary = crawl.topology.summary();
        info!(
            run = %run_id,
            state = ?state,
            devices = summary.devices,
            links = summary.links,
            adjacencies = summary.adjacencies,
            unreachable = summary.unreachable,
            "Discovery finished"
        );
        self.finish_event(run_id, state, summary);

        Ok(DiscoveryOutcome {
            run_id,
            state,
            topology: crawl.topology,
            visited: crawl.visit_order,
            summary,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Crawl one frontier level
    ///
    /// Returns reports in frontier order and the tasks skipped by cancellation.
    async fn run_level(
        &self,
        worker: &Worker,
        frontier: Vec<DiscoveryTask>,
        cancel: &CancelToken,
    ) -> (Vec<DeviceReport>, Vec<DiscoveryTask>) {
        let permits = Arc::new(Semaphore::new(self.config.max_sessions.max(1)));
        let mut tasks = JoinSet::new();
        let mut dispatched = Vec::new();
        let mut skipped = Vec::new();

        for (index, task) in frontier.into_iter().enumerate() {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                skipped.push(task);
                continue;
            };
            if cancel.is_cancelled() {
                skipped.push(task);
                continue;
            }

            dispatched.push((index, task.clone()));
            let worker = worker.clone();
            tasks.spawn(async move {
                let _permit = permit;
                worker.visit(index, task).await
            });
        }

        let mut reports = Vec::with_capacity(dispatched.len());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Discovery worker failed"),
            }
        }

        // A worker that panicked leaves no report; its device counts as unreachable
        for (index, task) in dispatched {
            if !reports.iter().any(|r| r.index == index) {
                let error = ConnectionError::unreachable(&task.address, "discovery worker failed");
                let result = Err(error);
                reports.push(DeviceReport { index, task, result });
            }
        }

        reports.sort_by_key(|r| r.index);
        (reports, skipped)
    }

    fn finish_event(&self, run_id: Uuid, state: RunState, summary: TopologySummary) {
        let _ = self.event_tx.send(DiscoveryEvent::RunFinished { run_id, state, summary });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabDevice, LabProvider};

    fn cdp_entry(host: &str, ip: &str, caps: &str, local: &str) -> String {
        format!(
            "-------------------------\n\
             Device ID: {host}\n\
             Entry address(es):\n  IP address: {ip}\n\
             Platform: cisco WS-C3750X-48,  Capabilities: {caps}\n\
             Interface: {local},  Port ID (outgoing port): GigabitEthernet1/0/48\n"
        )
    }

    fn engine(lab: LabProvider, max_depth: u32) -> DiscoveryEngine {
        let config = EngineConfig {
            max_depth,
            ..Default::default()
        };
        DiscoveryEngine::new(Arc::new(lab), Arc::new(DeviceClassifier::default()), config)
    }

    fn request() -> DiscoveryRequest {
        DiscoveryRequest::new("10.0.0.1", "cisco_ios", Credentials::new("admin", None))
    }

    #[tokio::test]
    async fn test_leaf_promoted_when_seen_crawlable() {
        // Seen first as a phone-like leaf from the seed, then as a switch from 10.0.0.2
        let seed_cdp = cdp_entry("b", "10.0.0.2", "Router Switch", "Gi1/0/1")
            + &cdp_entry("c", "10.0.0.3", "Host", "Gi1/0/2");
        let b_cdp = cdp_entry("c", "10.0.0.3", "Switch", "Gi1/0/3");
        let lab = LabProvider::new()
            .with_device("10.0.0.1", LabDevice::new("a").with_cdp(seed_cdp))
            .with_device("10.0.0.2", LabDevice::new("b").with_cdp(b_cdp))
            .with_device("10.0.0.3", LabDevice::new("c"));

        let outcome = engine(lab, 3).discover(request()).await.unwrap();
        let c = outcome.topology.get(&"10.0.0.3".into()).unwrap();
        assert_eq!(c.status, DeviceStatus::Crawled);
        assert_eq!(c.depth, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let lab = LabProvider::new().with_device("10.0.0.1", LabDevice::new("a"));
        let handle = CancelHandle::new();
        handle.cancel();
        let result = engine(lab, 3).discover_with_cancel(request(), handle.token()).await;
        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
    }

    #[test]
    fn test_cancel_token() {
        let handle = CancelHandle::new();
        let token = handle.token();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn test_event_serialization() {
        let event = DiscoveryEvent::Phase {
            address: "10.0.0.1".into(),
            depth: 2,
            phase: TaskPhase::Querying,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phase");
        assert_eq!(json["phase"], "querying");
    }
}
