//! apo-engine library - Automation Potential Overview scoring
//!
//! Combines occupation data (O*NET), web research (SERP) and per-occupation
//! automation factors into a 0-100 APO score with confidence, factor breakdown
//! and projections. Live sources fall back to deterministic synthetic data.

pub mod analysis;
pub mod api;
pub mod cache;
pub mod engine;
pub mod error;
pub mod single_flight;
pub mod sources;
pub mod types;

pub use crate::engine::{ApoEngine, EngineConfig, EngineSources};
pub use crate::error::{ApiError, ApiResult};

use apo_common::FeatureFlags;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: ApoEngine,
    /// Live source switches after credential reconciliation
    pub features: FeatureFlags,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: ApoEngine, features: FeatureFlags) -> Self {
        Self {
            engine,
            features,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::apo_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
