//! REST API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use nbrmap_core::{TopologyGraph, TopologySummary};
use nbrmap_discovery::RunState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::{AppState, RunParams};

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Liveness check
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configured device families and the capabilities that make a neighbor crawlable
pub async fn list_families(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "families": state.classifier.families(),
        "allowed_capabilities": state.config.classification.allowed_capabilities,
    }))
}

/// Body of `POST /api/discover`
#[derive(Debug, Default, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub demo: bool,
}

#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    pub run_id: String,
    pub state: RunState,
    pub summary: TopologySummary,
    pub tree: String,
    pub topology: TopologyGraph,
}

/// Run one discovery and return the finished topology
pub async fn discover(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DiscoverRequest>,
) -> impl IntoResponse {
    let demo = req.demo;
    let request = match state.request(RunParams {
        seed: req.seed,
        family: req.family,
        username: req.username,
        password: req.password,
        max_depth: req.max_depth,
        demo,
    }) {
        Ok(request) => request,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ApiError::new(e.to_string()))).into_response();
        }
    };

    info!(seed = %request.seed, family = %request.family, demo, "Discovery requested");
    match state.discover(request, demo).await {
        Ok(outcome) => Json(DiscoverResponse {
            run_id: outcome.run_id.to_string(),
            state: outcome.state,
            summary: outcome.summary,
            tree: outcome.render(),
            topology: outcome.topology.to_graph(),
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Discovery failed");
            (StatusCode::BAD_GATEWAY, Json(ApiError::new(e.to_string()))).into_response()
        }
    }
}
