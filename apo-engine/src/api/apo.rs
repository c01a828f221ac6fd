//! APO scoring endpoints
//!
//! - `GET /api/apo/:code` compute (or fetch cached) APO
//! - `GET /api/apo/:code/factors` active factor set
//! - `PUT /api/apo/:code/factors` replace the factor set
//! - `POST /api/apo/:code/scenarios` what-if scenarios (same query as the APO)
//! - `POST /api/apo/:code/feedback` observed APO fed back into factor weights
//! - `GET /api/obsolescence?skills=a,b&years=N` skill obsolescence timelines
//! - `GET /api/regions/compare?regions=a,b` regional ranking
//! - `GET /api/timelines?industry=&region=&years=N` growth multipliers

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::analysis::regional::RegionalComparison;
use crate::engine::scenarios::{ScenarioParams, ScenarioResult};
use crate::types::{ApoContext, AutomationFactor, DynamicApoResult, GrowthTimelines};
use crate::AppState;

/// Default obsolescence and growth timeline length (years)
const DEFAULT_TIMELINE_YEARS: u32 = 5;

/// Query parameters of `GET /api/apo/:code`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApoQuery {
    pub industry: Option<String>,
    pub region: Option<String>,
    pub timeframe_years: Option<f64>,
    pub forecast_months: Option<u32>,
}

impl From<ApoQuery> for ApoContext {
    fn from(query: ApoQuery) -> Self {
        ApoContext {
            industry: query.industry,
            region: query.region,
            timeframe_years: query.timeframe_years,
            forecast_months: query.forecast_months,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ObsolescenceQuery {
    /// Comma-separated skill names
    pub skills: String,
    pub years: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RegionsQuery {
    /// Comma-separated region names or codes
    pub regions: String,
}

#[derive(Debug, Deserialize)]
pub struct TimelinesQuery {
    pub industry: Option<String>,
    pub region: Option<String>,
    pub years: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    /// Observed APO, 0-100
    pub actual_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsolescenceResponse {
    pub years: u32,
    /// Cumulative obsolescence (0-1) per skill, one entry per year
    pub timelines: BTreeMap<String, Vec<f64>>,
}

/// GET /api/apo/:code
pub async fn get_apo(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ApoQuery>,
) -> ApiResult<Json<DynamicApoResult>> {
    let context = ApoContext::from(query);
    let result = state.engine.compute_apo(&code, &context).await?;
    Ok(Json(result))
}

/// GET /api/apo/:code/factors
pub async fn get_factors(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Vec<AutomationFactor>>> {
    Ok(Json(state.engine.factors(&code).await?))
}

/// PUT /api/apo/:code/factors
pub async fn put_factors(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(factors): Json<Vec<AutomationFactor>>,
) -> ApiResult<Json<Vec<AutomationFactor>>> {
    if factors.is_empty() {
        return Err(ApiError::BadRequest("factor set must not be empty".to_string()));
    }
    info!(code = %code, count = factors.len(), "Factor update requested");
    Ok(Json(state.engine.update_factors(&code, factors).await?))
}

/// GET /api/obsolescence
pub async fn get_obsolescence(
    State(state): State<AppState>,
    Query(query): Query<ObsolescenceQuery>,
) -> ApiResult<Json<ObsolescenceResponse>> {
    let years = query.years.unwrap_or(DEFAULT_TIMELINE_YEARS);
    let skills: Vec<String> = query.skills.split(',').map(str::to_string).collect();
    let timelines = state.engine.skill_obsolescence(&skills, years)?;
    Ok(Json(ObsolescenceResponse { years, timelines }))
}

/// POST /api/apo/:code/scenarios
pub async fn post_scenarios(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ApoQuery>,
    Json(scenarios): Json<Vec<ScenarioParams>>,
) -> ApiResult<Json<Vec<ScenarioResult>>> {
    let context = ApoContext::from(query);
    let results = state
        .engine
        .model_scenarios(&code, &context, &scenarios)
        .await?;
    Ok(Json(results))
}

/// POST /api/apo/:code/feedback
pub async fn post_feedback(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(feedback): Json<FeedbackRequest>,
) -> ApiResult<Json<Vec<AutomationFactor>>> {
    info!(code = %code, actual_score = feedback.actual_score, "Feedback received");
    Ok(Json(
        state
            .engine
            .apply_feedback(&code, feedback.actual_score)
            .await?,
    ))
}

/// GET /api/regions/compare
pub async fn get_region_comparison(
    State(state): State<AppState>,
    Query(query): Query<RegionsQuery>,
) -> ApiResult<Json<Vec<RegionalComparison>>> {
    let regions: Vec<String> = query.regions.split(',').map(str::to_string).collect();
    Ok(Json(state.engine.compare_regions(&regions)?))
}

/// GET /api/timelines
pub async fn get_timelines(
    State(state): State<AppState>,
    Query(query): Query<TimelinesQuery>,
) -> ApiResult<Json<GrowthTimelines>> {
    let years = query.years.unwrap_or(DEFAULT_TIMELINE_YEARS);
    let timelines = state.engine.growth_timelines(
        query.industry.as_deref(),
        query.region.as_deref(),
        years,
    )?;
    Ok(Json(timelines))
}

/// Build APO routes
pub fn apo_routes() -> Router<AppState> {
    Router::new()
        .route("/api/apo/:code", get(get_apo))
        .route("/api/apo/:code/factors", get(get_factors).put(put_factors))
        .route("/api/apo/:code/scenarios", post(post_scenarios))
        .route("/api/apo/:code/feedback", post(post_feedback))
        .route("/api/obsolescence", get(get_obsolescence))
        .route("/api/regions/compare", get(get_region_comparison))
        .route("/api/timelines", get(get_timelines))
}
