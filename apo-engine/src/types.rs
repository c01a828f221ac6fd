//! Core types for the APO scoring engine
//!
//! Scale convention: every externally visible score (APO, metrics, confidence in
//! results, factor breakdown) is on 0-100. Weights, multipliers and rates used
//! inside the analysis modules are on 0-1. Conversions happen in the engine at
//! module boundaries only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::analysis::adoption::AdoptionInsight;
use crate::analysis::correlation::CorrelationResult;
use crate::analysis::regional::RegionalInsight;

/// O*NET-SOC occupation code shape, e.g. `47-4011.01` (`d` = ASCII digit)
const ONET_CODE_SHAPE: &[u8; 10] = b"dd-dddd.dd";

fn is_onet_code(code: &str) -> bool {
    code.len() == ONET_CODE_SHAPE.len()
        && code
            .bytes()
            .zip(ONET_CODE_SHAPE.iter())
            .all(|(b, &shape)| match shape {
                b'd' => b.is_ascii_digit(),
                literal => b == literal,
            })
}

/// Clamp to the canonical 0-100 score scale; non-finite input maps to 0
pub fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Clamp to the 0-1 unit scale; non-finite input maps to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced to callers of the engine
///
/// Only malformed input reaches the caller; every data-source failure is
/// recovered inside the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApoError {
    /// Malformed occupation code or request parameter
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Source adapter failure
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Transport, status, auth, rate-limit or schema failure
    #[error("{kind} source unavailable: {reason}")]
    Unavailable { kind: ResourceKind, reason: String },

    /// Source switched off by feature flag or missing credentials
    #[error("{0} source disabled")]
    Disabled(ResourceKind),
}

impl SourceError {
    pub fn unavailable(kind: ResourceKind, reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            kind,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Identifiers and request parameters
// ============================================================================

/// Validated O*NET occupation code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OccupationCode(String);

impl OccupationCode {
    /// Validate and wrap an occupation code
    pub fn parse(code: &str) -> Result<Self, ApoError> {
        let trimmed = code.trim();
        if is_onet_code(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ApoError::Validation(format!(
                "Invalid O*NET occupation code {:?} (expected NN-NNNN.NN)",
                code
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-digit SOC major group (e.g. "15" for computer occupations)
    pub fn major_group(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for OccupationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OccupationCode {
    type Err = ApoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OccupationCode {
    type Error = ApoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OccupationCode> for String {
    fn from(code: OccupationCode) -> Self {
        code.0
    }
}

/// Inclusive time window for historical queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ApoError> {
        if start > end {
            return Err(ApoError::Validation(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `months` (30-day) months ending at `end`
    pub fn months_ending(end: DateTime<Utc>, months: u32) -> Self {
        Self {
            start: end - Duration::days(30 * i64::from(months)),
            end,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whole months covered (at least 1)
    pub fn month_count(&self) -> u32 {
        let days = (self.end - self.start).num_days().max(0);
        ((days / 30) as u32).max(1)
    }
}

/// Kinds of external data the engine consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    OccupationDetails,
    TechnologySkills,
    HistoricalSeries,
    ResearchSnippets,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::OccupationDetails => "occupation_details",
            ResourceKind::TechnologySkills => "technology_skills",
            ResourceKind::HistoricalSeries => "historical_series",
            ResourceKind::ResearchSnippets => "research_snippets",
        };
        f.write_str(name)
    }
}

/// Where a piece of input data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Mock,
}

/// Value tagged with its provenance
#[derive(Debug, Clone)]
pub struct Sourced<T> {
    pub data: T,
    pub provenance: Provenance,
}

impl<T> Sourced<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            provenance: Provenance::Live,
        }
    }

    pub fn mock(data: T) -> Self {
        Self {
            data,
            provenance: Provenance::Mock,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.provenance == Provenance::Mock
    }
}

/// Caller-supplied context for one APO computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApoContext {
    pub industry: Option<String>,
    pub region: Option<String>,
    /// Horizon for the time-based adjustment (years)
    pub timeframe_years: Option<f64>,
    /// Horizon for the trend forecast (months)
    pub forecast_months: Option<u32>,
}

impl ApoContext {
    pub fn validate(&self) -> Result<(), ApoError> {
        if let Some(years) = self.timeframe_years {
            if !years.is_finite() || years < 0.0 {
                return Err(ApoError::Validation(format!(
                    "timeframeYears must be a non-negative number, got {}",
                    years
                )));
            }
        }
        if let Some(months) = self.forecast_months {
            if months == 0 || months > 120 {
                return Err(ApoError::Validation(format!(
                    "forecastMonths must be in 1..=120, got {}",
                    months
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Source records
// ============================================================================

/// Occupation identity as returned by O*NET
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupationRecord {
    pub code: OccupationCode,
    pub title: String,
    pub description: String,
}

/// Technology used in an occupation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologySkill {
    pub name: String,
    pub category: String,
    /// O*NET "hot technology" marker (frequently posted in job ads)
    pub hot_technology: bool,
}

/// Research or search-engine result mentioning automation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSnippet {
    pub title: String,
    pub source: String,
    pub snippet: String,
    pub year: Option<i32>,
    /// Automation share quoted in the text (0-100)
    pub automation_percentage: Option<f64>,
    /// Relevance to the queried occupation (0-1)
    pub relevance: f64,
}

/// One dimension contributing to automation risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationFactor {
    pub id: String,
    pub name: String,
    pub category: String,
    /// 0-1
    pub weight: f64,
    /// 1-5
    pub complexity: f64,
    /// 0-1
    pub repetitiveness: f64,
    /// 0-1
    pub human_ai_collaboration: f64,
    /// 0-1
    pub emerging_tech_impact: f64,
    pub industry_specific: bool,
}

impl AutomationFactor {
    /// Copy with every numeric field forced into its documented range
    pub fn normalized(mut self) -> Self {
        self.weight = clamp_unit(self.weight);
        self.complexity = if self.complexity.is_finite() {
            self.complexity.clamp(1.0, 5.0)
        } else {
            3.0
        };
        self.repetitiveness = clamp_unit(self.repetitiveness);
        self.human_ai_collaboration = clamp_unit(self.human_ai_collaboration);
        self.emerging_tech_impact = clamp_unit(self.emerging_tech_impact);
        self
    }
}

/// Metrics of a historical observation (each 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalMetrics {
    pub apo: f64,
    pub task_automation: f64,
    pub skill_relevance: f64,
    pub technology_adoption: f64,
    pub market_demand: f64,
}

/// Driving factors of a historical observation (each 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointFactors {
    pub technology_impact: f64,
    pub industry_adoption: f64,
    pub market_growth: f64,
}

/// One observation of an occupation's automation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataPoint {
    pub timestamp: DateTime<Utc>,
    pub occupation_code: OccupationCode,
    pub metrics: HistoricalMetrics,
    pub source: String,
    /// 0-1
    pub confidence: f64,
    pub factors: DataPointFactors,
}

impl HistoricalDataPoint {
    /// Copy with percentage fields in [0,100] and confidence in [0,1]
    pub fn normalized(mut self) -> Self {
        let m = &mut self.metrics;
        m.apo = clamp_score(m.apo);
        m.task_automation = clamp_score(m.task_automation);
        m.skill_relevance = clamp_score(m.skill_relevance);
        m.technology_adoption = clamp_score(m.technology_adoption);
        m.market_demand = clamp_score(m.market_demand);
        let f = &mut self.factors;
        f.technology_impact = clamp_score(f.technology_impact);
        f.industry_adoption = clamp_score(f.industry_adoption);
        f.market_growth = clamp_score(f.market_growth);
        self.confidence = clamp_unit(self.confidence);
        self
    }
}

/// Normalize every point and order the series by timestamp
pub fn normalize_series(series: Vec<HistoricalDataPoint>) -> Vec<HistoricalDataPoint> {
    let mut points: Vec<_> = series.into_iter().map(HistoricalDataPoint::normalized).collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// APO observation or forecast used by the trend module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationTrend {
    pub date: DateTime<Utc>,
    /// 0-100
    pub apo_score: f64,
    pub factors: Vec<String>,
    /// 0-1
    pub confidence: f64,
    /// 0-1
    pub industry_impact: f64,
    /// 0-1
    pub technology_adoption: f64,
}

impl From<&HistoricalDataPoint> for AutomationTrend {
    fn from(point: &HistoricalDataPoint) -> Self {
        Self {
            date: point.timestamp,
            apo_score: point.metrics.apo,
            factors: Vec::new(),
            confidence: point.confidence,
            industry_impact: clamp_unit(point.factors.industry_adoption / 100.0),
            technology_adoption: clamp_unit(point.metrics.technology_adoption / 100.0),
        }
    }
}

// ============================================================================
// Engine output
// ============================================================================

/// Direction of a factor or series over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Per-factor impact and direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorTrend {
    pub name: String,
    /// weight × 100
    pub impact: f64,
    pub trend: TrendDirection,
}

/// Regional contribution split by income level (each 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalFactors {
    pub high_income: f64,
    pub middle_income: f64,
    pub low_income: f64,
}

/// Decomposition of the APO score into named dimensions (each 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorBreakdown {
    pub task_complexity: f64,
    pub collaboration_requirements: f64,
    pub industry_adoption: f64,
    pub emerging_tech_impact: f64,
    pub regional_factors: RegionalFactors,
}

/// Projected score at a future horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeProjection {
    /// Years from now: the requested timeframe plus the projection offset
    pub years_ahead: f64,
    pub year: i32,
    /// 0-100
    pub score: f64,
    /// 0-100
    pub confidence: f64,
}

/// Direction of the forecast the result was built on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub direction: TrendDirection,
    /// APO points per observation period
    pub slope: f64,
    pub forecast_months: u32,
}

/// How far technology adoption is from a target rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionOutlook {
    /// 0-1
    pub current_rate: f64,
    /// 0-1
    pub target_rate: f64,
    /// Observation periods until the target is reached; `None` without growth
    pub periods_to_target: Option<u32>,
}

/// Compound automation growth multipliers, one entry per year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthTimelines {
    pub years: u32,
    pub industry: Option<String>,
    pub region: Option<String>,
    pub industry_timeline: Vec<f64>,
    pub regional_timeline: Vec<f64>,
}

/// Provenance of each input the result was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub kind: ResourceKind,
    pub provenance: Provenance,
}

/// Engine output for one occupation and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicApoResult {
    pub occupation_code: OccupationCode,
    pub title: String,
    /// 0-100
    pub predicted_apo: f64,
    /// 0-100
    pub confidence: f64,
    pub factor_breakdown: FactorBreakdown,
    pub factor_trends: Vec<FactorTrend>,
    pub trend: TrendSummary,
    pub time_projections: Vec<TimeProjection>,
    /// Absent on the static fallback
    pub adoption_outlook: Option<AdoptionOutlook>,
    /// Absent on the static fallback
    pub historical_correlation: Option<CorrelationResult>,
    pub adoption_insights: Vec<AdoptionInsight>,
    pub regional_insights: Vec<RegionalInsight>,
    pub used_mock_data: bool,
    pub used_fallback: bool,
    pub sources: Vec<SourceReport>,
    pub last_updated: DateTime<Utc>,
}
