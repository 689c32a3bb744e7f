//! nbrmap Discovery - Neighbor-protocol crawling of network devices
//!
//! This crate provides:
//! - CDP and LLDP detail-output parsers and a merge of the two views
//! - Rule-based device family classification and crawlability checks
//! - The `SessionProvider` abstraction with OpenSSH and in-memory lab providers
//! - The breadth-first discovery engine

pub mod cdp;
pub mod classifier;
pub mod engine;
pub mod lab;
pub mod lldp;
pub mod merge;
pub mod session;
pub mod ssh;
mod text;

pub use cdp::parse_cdp;
pub use classifier::{ClassificationRule, ClassifierConfig, ClassifierConfigError, DeviceClassifier};
pub use engine::{
    CancelHandle, CancelToken, CommandSet, DiscoveryEngine, DiscoveryError, DiscoveryEvent,
    DiscoveryOutcome, DiscoveryRequest, EngineConfig, RunState, TaskPhase,
};
pub use lab::{
    demo_lab, CommandBehavior, ConnectBehavior, LabDevice, LabProvider, LabStats, DEMO_SEED,
};
pub use lldp::parse_lldp;
pub use merge::{merge, merge_with_conflicts, FieldConflict};
pub use session::{
    CommandError, ConnectionError, Credentials, Session, SessionProvider, SessionTarget,
};
pub use ssh::{parse_hostname, OpenSshProvider, OpenSshSession, SshOptions};
