//! Application state shared by the CLI and the REST API

use anyhow::{bail, Context, Result};
use nbrmap_core::UNKNOWN_FAMILY;
use nbrmap_discovery::{
    demo_lab, Credentials, DeviceClassifier, DiscoveryEngine, DiscoveryError, DiscoveryOutcome,
    DiscoveryRequest, DEMO_SEED,
};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// One discovery run as asked for by a user
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub seed: Option<String>,
    pub family: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_depth: Option<u32>,
    /// Crawl the built-in lab instead of real devices
    pub demo: bool,
}

/// Shared application state
pub struct AppState {
    /// Validated classification rules, shared by both engines
    pub classifier: Arc<DeviceClassifier>,
    /// Engine crawling real devices over SSH
    pub ssh: DiscoveryEngine,
    /// Engine crawling the in-memory demo lab
    pub demo: DiscoveryEngine,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state; invalid classification rules are fatal
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let classifier = DeviceClassifier::new(config.classification.clone())
            .context("Invalid classification configuration")?;
        let classifier = Arc::new(classifier);
        info!(families = ?classifier.families(), "Classification rules loaded");

        let engine_config = config.to_engine_config();
        let ssh = DiscoveryEngine::new(
            Arc::new(config.ssh_provider()),
            classifier.clone(),
            engine_config.clone(),
        );
        let demo = DiscoveryEngine::new(Arc::new(demo_lab()), classifier.clone(), engine_config);

        Ok(Arc::new(Self {
            classifier,
            ssh,
            demo,
            config,
        }))
    }

    /// Check user input and turn it into an engine request
    ///
    /// The demo lab needs no seed or credentials; real runs need both.
    pub fn request(&self, params: RunParams) -> Result<DiscoveryRequest> {
        let seed = match params.seed.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(seed) => seed,
            None if params.demo => DEMO_SEED.to_string(),
            None => bail!("A seed address is required"),
        };

        let family = params
            .family
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| self.config.discovery.default_family.clone());
        if family != UNKNOWN_FAMILY && !self.classifier.families().contains(&family.as_str()) {
            bail!("Unknown device family \"{}\"", family);
        }

        let username = params.username.unwrap_or_default();
        if username.trim().is_empty() && !params.demo {
            bail!("A username is required");
        }

        let credentials = Credentials::new(username.trim(), params.password);
        let mut request = DiscoveryRequest::new(seed, family, credentials);
        if let Some(depth) = params.max_depth {
            request = request.with_max_depth(depth);
        }
        Ok(request)
    }

    /// Run one discovery on the engine `demo` selects
    pub async fn discover(
        &self,
        request: DiscoveryRequest,
        demo: bool,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let engine = if demo { &self.demo } else { &self.ssh };
        engine.discover(request).await
    }
}
