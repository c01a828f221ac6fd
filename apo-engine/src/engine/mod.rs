//! APO aggregation engine
//!
//! `compute_apo` pipeline:
//! 1. Validate code and context (fail fast, before any fetch)
//! 2. Fresh cached result → return
//! 3. Single-flight by cache key; inputs (details, technologies, history,
//!    research) are gathered concurrently under a second single-flight keyed by
//!    occupation, each falling back to the mock source when the live source is
//!    disabled or fails
//! 4. Trend → time-based → adoption → regional, re-clamped to [0, 100] after
//!    each step
//! 5. Factor breakdown, projections, correlation, mock confidence discount
//! 6. Cache (write failures are logged and ignored)
//!
//! If gathering fails even through the mock source, or the pipeline produces a
//! non-finite value, a static result built from factor weights alone is
//! returned with `used_fallback = true`.
//!
//! Every factor set carries a generation stamp that is part of the cache and
//! flight keys, so a computation started before a factor update can never be
//! served after it.

pub mod factors;
pub mod scenarios;

use apo_common::config::{AppConfig, EngineTuning};
use chrono::{Datelike, Utc};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analysis::adoption::{industry_rate, is_known_industry};
use crate::analysis::regional::{overall_impact, RegionalComparison};
use crate::analysis::time_based::occupation_label_for;
use crate::analysis::trend::confidence as trend_confidence;
use crate::analysis::{
    AdoptionAnalyzer, CorrelationAnalyzer, RegionalAnalyzer, RegionalMarketData,
    TechnologyAdoption, TimeBasedAdjuster, TrendAnalyzer, TrendPrediction,
};
use crate::cache::{Cache, TtlCache};
use crate::single_flight::SingleFlight;
use crate::sources::onet_client::SNAPSHOT_POINTS;
use crate::sources::{MockSource, OccupationSource, ResearchSource};
use crate::types::{
    clamp_score, normalize_series, AdoptionOutlook, ApoContext, ApoError, AutomationFactor,
    AutomationTrend, DateRange, DynamicApoResult, FactorTrend, GrowthTimelines,
    HistoricalDataPoint, OccupationCode, OccupationRecord, ResearchSnippet, ResourceKind,
    SourceError, SourceReport, Sourced, TechnologySkill, TimeProjection, TrendDirection,
    TrendSummary,
};

use factors::{factor_breakdown, seed_factors, static_apo, FactorSignals};
use scenarios::{validate_scenarios, ScenarioParams, ScenarioResult};

/// Confidence of the static fallback result
pub const FALLBACK_CONFIDENCE: f64 = 5.0;

/// Floor applied to a scored result's confidence before any mock discount
pub const MIN_SCORED_CONFIDENCE: f64 = 10.0;

/// Projection offsets beyond the requested timeframe (years)
pub const PROJECTION_YEARS: [u32; 3] = [2, 5, 10];

/// Confidence lost per projected year
const PROJECTION_CONFIDENCE_DECAY: f64 = 5.0;

/// Longest obsolescence or growth timeline
const MAX_TIMELINE_YEARS: u32 = 50;

/// Adoption rate the outlook counts periods towards
pub const ADOPTION_TARGET_RATE: f64 = 0.8;

/// Weight change per feedback report
pub const FEEDBACK_LEARNING_RATE: f64 = 0.05;

/// Engine settings derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tuning: EngineTuning,
    pub apo_ttl: Duration,
    pub historical_ttl: Duration,
    pub apo_max_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: config.engine.clone(),
            apo_ttl: Duration::from_secs(config.cache.apo_ttl_secs),
            historical_ttl: Duration::from_secs(config.cache.historical_ttl_secs),
            apo_max_entries: config.cache.apo_max_entries,
        }
    }
}

/// Live and fallback sources
///
/// A `None` live source is disabled and always takes the fallback path.
#[derive(Clone)]
pub struct EngineSources {
    pub occupation: Option<Arc<dyn OccupationSource>>,
    pub research: Option<Arc<dyn ResearchSource>>,
    pub fallback_occupation: Arc<dyn OccupationSource>,
    pub fallback_research: Arc<dyn ResearchSource>,
}

impl Default for EngineSources {
    fn default() -> Self {
        Self::mock_only()
    }
}

impl EngineSources {
    /// No live sources; everything comes from [`MockSource`]
    pub fn mock_only() -> Self {
        let mock = Arc::new(MockSource::new());
        Self {
            occupation: None,
            research: None,
            fallback_occupation: mock.clone(),
            fallback_research: mock,
        }
    }

    pub fn with_occupation(mut self, source: Arc<dyn OccupationSource>) -> Self {
        self.occupation = Some(source);
        self
    }

    pub fn with_research(mut self, source: Arc<dyn ResearchSource>) -> Self {
        self.research = Some(source);
        self
    }

    pub fn with_fallback_occupation(mut self, source: Arc<dyn OccupationSource>) -> Self {
        self.fallback_occupation = source;
        self
    }

    pub fn with_fallback_research(mut self, source: Arc<dyn ResearchSource>) -> Self {
        self.fallback_research = source;
        self
    }
}

/// Request context with defaults applied
///
/// Industry and region are lower-cased, and dropped when no table knows them.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedContext {
    industry: Option<String>,
    region: Option<String>,
    timeframe_years: f64,
    forecast_months: u32,
}

/// Active factor set of one occupation
#[derive(Debug, Clone)]
struct FactorSet {
    /// 0 for the seed set; bumped by every update
    generation: u64,
    factors: Vec<AutomationFactor>,
}

/// Inputs gathered for one occupation
struct Gathered {
    range: DateRange,
    details: Sourced<OccupationRecord>,
    technologies: Sourced<Vec<TechnologySkill>>,
    history: Sourced<Vec<HistoricalDataPoint>>,
    research: Sourced<Vec<ResearchSnippet>>,
}

impl Gathered {
    fn any_mock(&self) -> bool {
        self.details.is_mock()
            || self.technologies.is_mock()
            || self.history.is_mock()
            || self.research.is_mock()
    }

    fn reports(&self) -> Vec<SourceReport> {
        vec![
            SourceReport {
                kind: ResourceKind::OccupationDetails,
                provenance: self.details.provenance,
            },
            SourceReport {
                kind: ResourceKind::TechnologySkills,
                provenance: self.technologies.provenance,
            },
            SourceReport {
                kind: ResourceKind::HistoricalSeries,
                provenance: self.history.provenance,
            },
            SourceReport {
                kind: ResourceKind::ResearchSnippets,
                provenance: self.research.provenance,
            },
        ]
    }
}

type SharedInputs = Result<Arc<Gathered>, SourceError>;

/// Intermediate values of one scoring pass
struct Evaluation {
    /// Trend forecast before the time step
    base: f64,
    prediction: TrendPrediction,
    adoption: TechnologyAdoption,
    region: RegionalMarketData,
    occupation_label: &'static str,
    predicted_apo: f64,
    confidence: f64,
    used_mock_data: bool,
}

/// APO scoring engine
///
/// Cheap to clone; clones share caches, in-flight computations and factor sets.
#[derive(Clone)]
pub struct ApoEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    sources: EngineSources,
    apo_cache: Arc<dyn Cache<DynamicApoResult>>,
    history_cache: TtlCache<Sourced<Vec<HistoricalDataPoint>>>,
    flights: SingleFlight<DynamicApoResult>,
    gather_flights: SingleFlight<SharedInputs>,
    factor_sets: RwLock<HashMap<OccupationCode, FactorSet>>,
    factor_generation: AtomicU64,
    last_error: RwLock<Option<String>>,
    trend: TrendAnalyzer,
    time: TimeBasedAdjuster,
    adoption: AdoptionAnalyzer,
    regional: RegionalAnalyzer,
    correlation: CorrelationAnalyzer,
}

impl ApoEngine {
    pub fn new(config: EngineConfig, sources: EngineSources) -> Self {
        let cache = Arc::new(
            TtlCache::<DynamicApoResult>::new(config.apo_ttl).with_max_entries(config.apo_max_entries),
        );
        Self::with_cache(config, sources, cache)
    }

    /// Engine with a caller-supplied result cache
    pub fn with_cache(
        config: EngineConfig,
        sources: EngineSources,
        apo_cache: Arc<dyn Cache<DynamicApoResult>>,
    ) -> Self {
        info!(
            occupation_source = sources.occupation.as_ref().map(|s| s.name()).unwrap_or("disabled"),
            research_source = sources.research.as_ref().map(|s| s.name()).unwrap_or("disabled"),
            apo_ttl_secs = config.apo_ttl.as_secs(),
            apo_max_entries = config.apo_max_entries,
            "APO engine initialized"
        );

        Self {
            inner: Arc::new(EngineInner {
                history_cache: TtlCache::new(config.historical_ttl),
                config,
                sources,
                apo_cache,
                flights: SingleFlight::new(),
                gather_flights: SingleFlight::new(),
                factor_sets: RwLock::new(HashMap::new()),
                factor_generation: AtomicU64::new(0),
                last_error: RwLock::new(None),
                trend: TrendAnalyzer::new(),
                time: TimeBasedAdjuster::new(),
                adoption: AdoptionAnalyzer::new(),
                regional: RegionalAnalyzer::new(),
                correlation: CorrelationAnalyzer::new(),
            }),
        }
    }

    /// Compute (or return the cached) APO for an occupation
    ///
    /// # Errors
    /// `ApoError::Validation` for a malformed code or context. Source failures
    /// never surface here.
    pub async fn compute_apo(
        &self,
        code: &str,
        context: &ApoContext,
    ) -> Result<DynamicApoResult, ApoError> {
        let code = OccupationCode::parse(code)?;
        context.validate()?;
        let ctx = self.inner.resolve(context);
        let factor_set = self.inner.factor_set(&code).await;
        let key = self.inner.cache_key(&code, &ctx, factor_set.generation);

        if let Some(hit) = self.inner.apo_cache.get(&key).await {
            debug!(code = %code, "APO cache hit");
            return Ok(hit);
        }

        let inner = self.inner.clone();
        let flight_key = key.clone();
        let result = self
            .inner
            .flights
            .run(&key, move || async move {
                inner.compute_uncached(code, ctx, factor_set, flight_key).await
            })
            .await;

        Ok(result)
    }

    /// Evaluate what-if scenarios against the current APO
    ///
    /// Scenario results are not cached.
    pub async fn model_scenarios(
        &self,
        code: &str,
        context: &ApoContext,
        scenarios: &[ScenarioParams],
    ) -> Result<Vec<ScenarioResult>, ApoError> {
        let code = OccupationCode::parse(code)?;
        context.validate()?;
        validate_scenarios(scenarios)?;
        let ctx = self.inner.resolve(context);
        let factor_set = self.inner.factor_set(&code).await;

        let evaluation = match self.inner.gather_shared(&code).await {
            Ok(inputs) => self.inner.evaluate(&code, &ctx, &factor_set.factors, &inputs),
            Err(e) => {
                warn!(code = %code, error = %e, "Input gathering failed, scenarios use static APO");
                self.inner.record_error(format!("{}: {}", code, e)).await;
                None
            }
        };

        let results: Vec<ScenarioResult> = scenarios
            .iter()
            .map(|scenario| {
                self.inner
                    .scenario(&ctx, evaluation.as_ref(), &factor_set.factors, scenario)
            })
            .collect();

        info!(
            code = %code,
            scenarios = results.len(),
            used_fallback = evaluation.is_none(),
            "Scenarios modeled"
        );
        Ok(results)
    }

    /// Replace the active factor set for an occupation
    ///
    /// Factors are clamped into range. Every cached APO result is invalidated.
    pub async fn update_factors(
        &self,
        code: &str,
        factors: Vec<AutomationFactor>,
    ) -> Result<Vec<AutomationFactor>, ApoError> {
        let code = OccupationCode::parse(code)?;
        if let Some(bad) = factors.iter().find(|f| f.id.trim().is_empty()) {
            return Err(ApoError::Validation(format!(
                "Factor {:?} has an empty id",
                bad.name
            )));
        }

        let factors: Vec<AutomationFactor> =
            factors.into_iter().map(AutomationFactor::normalized).collect();
        let stored = self.inner.store_factors(&code, |_| factors).await;

        info!(code = %code, factors = stored.len(), "Factor set updated, APO cache cleared");
        Ok(stored)
    }

    /// Feed an observed APO back into the factor weights
    ///
    /// Weights grow by [`FEEDBACK_LEARNING_RATE`] when the observed score is
    /// above 50 and shrink by it otherwise. Cached results are invalidated as
    /// for [`ApoEngine::update_factors`].
    pub async fn apply_feedback(
        &self,
        code: &str,
        actual_score: f64,
    ) -> Result<Vec<AutomationFactor>, ApoError> {
        let code = OccupationCode::parse(code)?;
        if !actual_score.is_finite() || !(0.0..=100.0).contains(&actual_score) {
            return Err(ApoError::Validation(format!(
                "actualScore must be in [0, 100], got {}",
                actual_score
            )));
        }

        let scale = if actual_score > 50.0 {
            1.0 + FEEDBACK_LEARNING_RATE
        } else {
            1.0 - FEEDBACK_LEARNING_RATE
        };
        let stored = self
            .inner
            .store_factors(&code, |current| {
                current
                    .into_iter()
                    .map(|factor| {
                        AutomationFactor {
                            weight: factor.weight * scale,
                            ..factor
                        }
                        .normalized()
                    })
                    .collect()
            })
            .await;

        info!(code = %code, actual_score, scale, "Feedback applied to factor weights");
        Ok(stored)
    }

    /// Active factor set (last update, or the major-group seed)
    pub async fn factors(&self, code: &str) -> Result<Vec<AutomationFactor>, ApoError> {
        let code = OccupationCode::parse(code)?;
        Ok(self.inner.factor_set(&code).await.factors)
    }

    /// Most recent source failure, for diagnostics
    pub async fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().await.clone()
    }

    /// Cumulative obsolescence per skill for `years` years
    pub fn skill_obsolescence(
        &self,
        skills: &[String],
        years: u32,
    ) -> Result<BTreeMap<String, Vec<f64>>, ApoError> {
        check_timeline_years(years)?;
        let skills: Vec<String> = skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if skills.is_empty() {
            return Err(ApoError::Validation("at least one skill is required".to_string()));
        }
        Ok(self.inner.time.obsolescence(&skills, years))
    }

    /// Compound industry and regional growth multipliers for `years` years
    pub fn growth_timelines(
        &self,
        industry: Option<&str>,
        region: Option<&str>,
        years: u32,
    ) -> Result<GrowthTimelines, ApoError> {
        check_timeline_years(years)?;
        let (industry, region) = (non_blank(industry), non_blank(region));

        Ok(GrowthTimelines {
            years,
            industry: industry.map(str::to_string),
            region: region.map(str::to_string),
            industry_timeline: self.inner.time.industry_timeline(industry, years),
            regional_timeline: self.inner.time.regional_timeline(region, years),
        })
    }

    /// Rank regions (names or codes) by overall regional impact
    pub fn compare_regions(&self, regions: &[String]) -> Result<Vec<RegionalComparison>, ApoError> {
        let profiles = regions
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|r| {
                self.inner
                    .regional
                    .find(r)
                    .cloned()
                    .ok_or_else(|| ApoError::Validation(format!("Unknown region {:?}", r)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if profiles.is_empty() {
            return Err(ApoError::Validation("at least one region is required".to_string()));
        }
        Ok(self.inner.regional.compare_regions(&profiles))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_timeline_years(years: u32) -> Result<(), ApoError> {
    if years == 0 || years > MAX_TIMELINE_YEARS {
        return Err(ApoError::Validation(format!(
            "years must be in 1..={}, got {}",
            MAX_TIMELINE_YEARS, years
        )));
    }
    Ok(())
}

impl EngineInner {
    fn resolve(&self, context: &ApoContext) -> ResolvedContext {
        let label = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_lowercase)
        };

        let industry = label(&context.industry)
            .filter(|i| self.time.knows_industry(i) || is_known_industry(i));
        let region = label(&context.region)
            .filter(|r| self.time.knows_region(r) || self.regional.find(r).is_some());
        if industry.is_none() && context.industry.is_some() {
            debug!(industry = ?context.industry, "Unrecognized industry, using defaults");
        }
        if region.is_none() && context.region.is_some() {
            debug!(region = ?context.region, "Unrecognized region, using defaults");
        }

        ResolvedContext {
            industry,
            region,
            timeframe_years: context
                .timeframe_years
                .unwrap_or(self.config.tuning.default_timeframe_years),
            forecast_months: context
                .forecast_months
                .unwrap_or(self.config.tuning.forecast_months),
        }
    }

    /// Occupation code, factor generation and every input that changes the result
    fn cache_key(&self, code: &OccupationCode, ctx: &ResolvedContext, generation: u64) -> String {
        format!(
            "{}|g={}|t={}|i={}|r={}|m={}|onet={}|serp={}",
            code,
            generation,
            ctx.timeframe_years,
            ctx.industry.as_deref().unwrap_or(""),
            ctx.region.as_deref().unwrap_or(""),
            ctx.forecast_months,
            self.sources.occupation.is_some(),
            self.sources.research.is_some(),
        )
    }

    async fn factor_set(&self, code: &OccupationCode) -> FactorSet {
        match self.factor_sets.read().await.get(code) {
            Some(set) => set.clone(),
            None => FactorSet {
                generation: 0,
                factors: seed_factors(code),
            },
        }
    }

    async fn factor_generation_of(&self, code: &OccupationCode) -> u64 {
        self.factor_sets
            .read()
            .await
            .get(code)
            .map(|set| set.generation)
            .unwrap_or(0)
    }

    /// Replace a factor set under the write lock, then drop every cached result
    async fn store_factors<F>(&self, code: &OccupationCode, update: F) -> Vec<AutomationFactor>
    where
        F: FnOnce(Vec<AutomationFactor>) -> Vec<AutomationFactor>,
    {
        let factors = {
            let mut sets = self.factor_sets.write().await;
            let current = sets
                .get(code)
                .map(|set| set.factors.clone())
                .unwrap_or_else(|| seed_factors(code));
            let factors = update(current);
            let generation = self.factor_generation.fetch_add(1, Ordering::SeqCst) + 1;
            sets.insert(
                code.clone(),
                FactorSet {
                    generation,
                    factors: factors.clone(),
                },
            );
            factors
        };
        self.apo_cache.clear().await;
        factors
    }

    async fn compute_uncached(
        self: Arc<Self>,
        code: OccupationCode,
        ctx: ResolvedContext,
        factor_set: FactorSet,
        key: String,
    ) -> DynamicApoResult {
        // A flight that finished between our cache miss and joining
        if let Some(hit) = self.apo_cache.get(&key).await {
            return hit;
        }

        let factors = &factor_set.factors;
        let scored = match self.gather_shared(&code).await {
            Ok(inputs) => self.score(&code, &ctx, factors, &inputs),
            Err(e) => {
                warn!(code = %code, error = %e, "Input gathering failed, using static fallback");
                self.record_error(format!("{}: {}", code, e)).await;
                None
            }
        };

        let Some(result) = scored else {
            return self.static_fallback(&code, &ctx, factors);
        };

        if self.factor_generation_of(&code).await != factor_set.generation {
            debug!(code = %code, "Factor set replaced during computation, result not cached");
        } else if let Err(e) = self.apo_cache.set(&key, result.clone()).await {
            warn!(code = %code, error = %e, "APO cache write failed");
        }

        info!(
            code = %code,
            predicted_apo = result.predicted_apo,
            confidence = result.confidence,
            used_mock_data = result.used_mock_data,
            "APO computed"
        );
        result
    }

    /// Inputs for `code`, shared with any concurrent request for the same code
    async fn gather_shared(self: &Arc<Self>, code: &OccupationCode) -> SharedInputs {
        let inner = Arc::clone(self);
        let flight_code = code.clone();
        self.gather_flights
            .run(code.as_str(), move || async move {
                inner.gather(&flight_code).await.map(Arc::new)
            })
            .await
    }

    async fn gather(&self, code: &OccupationCode) -> Result<Gathered, SourceError> {
        let range = DateRange::months_ending(Utc::now(), self.config.tuning.history_months);

        let details_and_research = async {
            let details = self.fetch_details(code).await?;
            let query = format!("{} automation potential", details.data.title);
            let research = self.fetch_research(&query).await?;
            Ok::<_, SourceError>((details, research))
        };

        let (details_and_research, technologies, history) = tokio::join!(
            details_and_research,
            self.fetch_technologies(code),
            self.fetch_history(code, range),
        );
        let (details, research) = details_and_research?;

        Ok(Gathered {
            range,
            details,
            technologies: technologies?,
            history: history?,
            research,
        })
    }

    async fn fetch_details(
        &self,
        code: &OccupationCode,
    ) -> Result<Sourced<OccupationRecord>, SourceError> {
        self.with_fallback(
            ResourceKind::OccupationDetails,
            self.sources
                .occupation
                .as_ref()
                .map(|s| s.fetch_occupation_details(code)),
            self.sources.fallback_occupation.fetch_occupation_details(code),
        )
        .await
    }

    async fn fetch_technologies(
        &self,
        code: &OccupationCode,
    ) -> Result<Sourced<Vec<TechnologySkill>>, SourceError> {
        self.with_fallback(
            ResourceKind::TechnologySkills,
            self.sources
                .occupation
                .as_ref()
                .map(|s| s.fetch_technology_skills(code)),
            self.sources.fallback_occupation.fetch_technology_skills(code),
        )
        .await
    }

    /// Historical series, normalized and sorted; live series cached separately
    async fn fetch_history(
        &self,
        code: &OccupationCode,
        range: DateRange,
    ) -> Result<Sourced<Vec<HistoricalDataPoint>>, SourceError> {
        let key = format!("{}|{}", code, self.config.tuning.history_months);
        if self.sources.occupation.is_some() {
            if let Some(hit) = self.history_cache.get(&key).await {
                debug!(code = %code, "Historical series cache hit");
                return Ok(hit);
            }
        }

        let series = self.with_fallback(
            ResourceKind::HistoricalSeries,
            self.sources
                .occupation
                .as_ref()
                .map(|s| s.fetch_historical_series(code, range)),
            self.sources.fallback_occupation.fetch_historical_series(code, range),
        )
        .await?;

        let series = Sourced {
            data: normalize_series(series.data),
            provenance: series.provenance,
        };

        if !series.is_mock() {
            if let Err(e) = self.history_cache.set(&key, series.clone()).await {
                warn!(code = %code, error = %e, "Historical cache write failed");
            }
        }
        Ok(series)
    }

    async fn fetch_research(
        &self,
        query: &str,
    ) -> Result<Sourced<Vec<ResearchSnippet>>, SourceError> {
        self.with_fallback(
            ResourceKind::ResearchSnippets,
            self.sources
                .research
                .as_ref()
                .map(|s| s.fetch_research_snippets(query)),
            self.sources.fallback_research.fetch_research_snippets(query),
        )
        .await
    }

    /// Trend, adoption profile and confidence; `None` on a non-finite result
    fn evaluate(
        &self,
        code: &OccupationCode,
        ctx: &ResolvedContext,
        factors: &[AutomationFactor],
        inputs: &Gathered,
    ) -> Option<Evaluation> {
        // Every observation is attributed to the whole active factor set
        let names: Vec<String> = factors.iter().map(|f| f.name.clone()).collect();
        let history: Vec<AutomationTrend> = inputs
            .history
            .data
            .iter()
            .map(|point| AutomationTrend {
                factors: names.clone(),
                ..AutomationTrend::from(point)
            })
            .collect();

        let prediction = self.trend.predict(&history, factors, ctx.forecast_months);
        if !prediction.predicted_apo.is_finite() {
            return None;
        }

        // A synthetic series never counts for more observations than a live snapshot
        let observations = if inputs.history.is_mock() {
            history.len().min(SNAPSHOT_POINTS)
        } else {
            history.len()
        };
        let used_mock_data = inputs.any_mock();
        let mut confidence = trend_confidence(observations, factors).max(MIN_SCORED_CONFIDENCE);
        if used_mock_data {
            confidence *= 1.0 - self.config.tuning.mock_confidence_discount;
        }
        if !confidence.is_finite() {
            return None;
        }

        let mut evaluation = Evaluation {
            base: prediction.predicted_apo,
            prediction,
            adoption: self.adoption.adoption_from_signals(
                &inputs.details.data.title,
                &inputs.history.data,
                &inputs.technologies.data,
                &inputs.research.data,
            ),
            region: self.regional.profile(ctx.region.as_deref()).clone(),
            occupation_label: occupation_label_for(code),
            predicted_apo: 0.0,
            confidence: clamp_score(confidence),
            used_mock_data,
        };

        let predicted_apo = self.score_at(&evaluation, ctx, ctx.timeframe_years);
        if !predicted_apo.is_finite() {
            return None;
        }
        evaluation.predicted_apo = predicted_apo;
        Some(evaluation)
    }

    /// Time, adoption then regional steps at a horizon, each re-clamped
    fn score_at(&self, evaluation: &Evaluation, ctx: &ResolvedContext, years: f64) -> f64 {
        let industry = ctx.industry.as_deref();
        let after_time = clamp_score(self.time.adjust(
            evaluation.base,
            years,
            industry,
            ctx.region.as_deref(),
            Some(evaluation.occupation_label),
        ));
        let after_adoption = clamp_score(
            self.adoption
                .calculate_impact(after_time / 100.0, &evaluation.adoption, industry)
                * 100.0,
        );
        clamp_score(self.regional.calculate_impact(after_adoption / 100.0, &evaluation.region) * 100.0)
    }

    /// Projections at `offsets` years beyond the requested timeframe, scaled by `scale`
    fn projections(
        &self,
        evaluation: &Evaluation,
        ctx: &ResolvedContext,
        offsets: &[u32],
        scale: f64,
    ) -> Vec<TimeProjection> {
        let current_year = Utc::now().year();
        offsets
            .iter()
            .map(|&offset| {
                let years_ahead = ctx.timeframe_years + f64::from(offset);
                TimeProjection {
                    years_ahead,
                    year: current_year + years_ahead.round() as i32,
                    score: clamp_score(self.score_at(evaluation, ctx, years_ahead) * scale),
                    confidence: clamp_score(
                        evaluation.confidence - PROJECTION_CONFIDENCE_DECAY * f64::from(offset),
                    ),
                }
            })
            .collect()
    }

    /// Run the analysis pipeline; `None` on a non-finite result
    fn score(
        &self,
        code: &OccupationCode,
        ctx: &ResolvedContext,
        factors: &[AutomationFactor],
        inputs: &Gathered,
    ) -> Option<DynamicApoResult> {
        let evaluation = self.evaluate(code, ctx, factors, inputs)?;
        let industry = ctx.industry.as_deref();

        let factor_breakdown = factor_breakdown(
            evaluation.predicted_apo,
            FactorSignals::from_factors(factors),
            industry_rate(&evaluation.adoption, industry),
            overall_impact(&evaluation.region),
        );

        let prediction = &evaluation.prediction;
        Some(DynamicApoResult {
            occupation_code: code.clone(),
            title: inputs.details.data.title.clone(),
            predicted_apo: evaluation.predicted_apo,
            confidence: evaluation.confidence,
            factor_breakdown,
            factor_trends: prediction.factor_trends.clone(),
            trend: TrendSummary {
                direction: prediction.direction,
                slope: prediction.slope,
                forecast_months: prediction.timeframe_months,
            },
            time_projections: self.projections(&evaluation, ctx, &PROJECTION_YEARS, 1.0),
            adoption_outlook: Some(AdoptionOutlook {
                current_rate: evaluation.adoption.current_adoption_rate,
                target_rate: ADOPTION_TARGET_RATE,
                periods_to_target: self
                    .adoption
                    .predict_adoption_timeline(&evaluation.adoption, ADOPTION_TARGET_RATE),
            }),
            historical_correlation: Some(
                self.correlation
                    .analyze(&inputs.history.data, inputs.range.start()),
            ),
            adoption_insights: self.adoption.generate_insights(&evaluation.adoption, industry),
            regional_insights: self.regional.generate_insights(&evaluation.region),
            used_mock_data: evaluation.used_mock_data,
            used_fallback: false,
            sources: inputs.reports(),
            last_updated: Utc::now(),
        })
    }

    /// One scenario against the evaluated baseline, or the static APO without one
    fn scenario(
        &self,
        ctx: &ResolvedContext,
        evaluation: Option<&Evaluation>,
        factors: &[AutomationFactor],
        params: &ScenarioParams,
    ) -> ScenarioResult {
        let adjustments = &params.factor_adjustments;
        let ratio = adjustments.ratio();
        let (baseline_score, confidence, time_projections) = match evaluation {
            Some(evaluation) => (
                evaluation.predicted_apo,
                evaluation.confidence,
                self.projections(evaluation, ctx, &params.time_horizon_years, ratio),
            ),
            None => (static_apo(factors), FALLBACK_CONFIDENCE, Vec::new()),
        };

        ScenarioResult {
            scenario_name: params.name.trim().to_string(),
            scenario_description: params.description.clone(),
            baseline_score,
            adjusted_score: clamp_score(baseline_score * ratio),
            confidence,
            weights: adjustments.weights(),
            time_projections,
        }
    }

    /// Result from factor weights alone, at minimum confidence
    fn static_fallback(
        &self,
        code: &OccupationCode,
        ctx: &ResolvedContext,
        factors: &[AutomationFactor],
    ) -> DynamicApoResult {
        let predicted_apo = static_apo(factors);
        warn!(code = %code, predicted_apo, "Returning static fallback APO");

        DynamicApoResult {
            occupation_code: code.clone(),
            title: occupation_label_for(code).to_string(),
            predicted_apo,
            confidence: FALLBACK_CONFIDENCE,
            factor_breakdown: factor_breakdown(
                predicted_apo,
                FactorSignals::from_factors(factors),
                0.5,
                0.5,
            ),
            factor_trends: factors
                .iter()
                .map(|f| FactorTrend {
                    name: f.name.clone(),
                    impact: f.weight * 100.0,
                    trend: TrendDirection::Stable,
                })
                .collect(),
            trend: TrendSummary {
                direction: TrendDirection::Stable,
                slope: 0.0,
                forecast_months: ctx.forecast_months,
            },
            time_projections: Vec::new(),
            adoption_outlook: None,
            historical_correlation: None,
            adoption_insights: Vec::new(),
            regional_insights: Vec::new(),
            used_mock_data: false,
            used_fallback: true,
            sources: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Live fetch with mock fallback
    ///
    /// A disabled source (`live == None`) and a failing one take the same path.
    async fn with_fallback<T, L, M>(
        &self,
        kind: ResourceKind,
        live: Option<L>,
        fallback: M,
    ) -> Result<Sourced<T>, SourceError>
    where
        L: Future<Output = Result<T, SourceError>>,
        M: Future<Output = Result<T, SourceError>>,
    {
        let failure = match live {
            Some(fetch) => match fetch.await {
                Ok(data) => return Ok(Sourced::live(data)),
                Err(e) => e,
            },
            None => SourceError::Disabled(kind),
        };

        match &failure {
            SourceError::Disabled(_) => debug!(kind = %kind, "Source disabled, using mock data"),
            SourceError::Unavailable { reason, .. } => {
                warn!(kind = %kind, reason = %reason, "Source unavailable, using mock data");
                self.record_error(failure.to_string()).await;
            }
        }

        match fallback.await {
            Ok(data) => Ok(Sourced::mock(data)),
            Err(e) => {
                warn!(kind = %kind, error = %e, "Mock fallback failed");
                Err(e)
            }
        }
    }

    async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_fallback_paths() {
        let engine = ApoEngine::new(EngineConfig::default(), EngineSources::mock_only());
        let inner = &engine.inner;

        let live: Sourced<u32> = inner
            .with_fallback(ResourceKind::TechnologySkills, Some(async { Ok(1) }), async { Ok(2) })
            .await
            .unwrap();
        assert_eq!((live.data, live.is_mock()), (1, false));

        let disabled = inner
            .with_fallback::<u32, std::future::Ready<Result<u32, SourceError>>, _>(
                ResourceKind::TechnologySkills,
                None,
                async { Ok(3) },
            )
            .await
            .unwrap();
        assert_eq!((disabled.data, disabled.is_mock()), (3, true));
        assert_eq!(engine.last_error().await, None);

        let failed = inner
            .with_fallback(
                ResourceKind::TechnologySkills,
                Some(async { Err(SourceError::unavailable(ResourceKind::TechnologySkills, "boom")) }),
                async { Ok(2u32) },
            )
            .await
            .unwrap();
        assert_eq!((failed.data, failed.is_mock()), (2, true));
        assert!(engine.last_error().await.unwrap().contains("boom"));
    }

    #[test]
    fn test_cache_key_covers_context() {
        let engine = ApoEngine::new(EngineConfig::default(), EngineSources::mock_only());
        let code = OccupationCode::parse("15-1252.00").unwrap();
        let inner = &engine.inner;

        let base = inner.resolve(&ApoContext::default());
        let other_region = inner.resolve(&ApoContext {
            region: Some("Africa".to_string()),
            ..Default::default()
        });
        let padded_default = inner.resolve(&ApoContext {
            industry: Some("   ".to_string()),
            timeframe_years: Some(2.0),
            forecast_months: Some(6),
            ..Default::default()
        });

        assert_ne!(inner.cache_key(&code, &base, 0), inner.cache_key(&code, &other_region, 0));
        assert_eq!(inner.cache_key(&code, &base, 0), inner.cache_key(&code, &padded_default, 0));
        assert_ne!(inner.cache_key(&code, &base, 0), inner.cache_key(&code, &base, 1));
    }

    #[test]
    fn test_unknown_labels_resolve_to_defaults() {
        let engine = ApoEngine::new(EngineConfig::default(), EngineSources::mock_only());
        let inner = &engine.inner;

        let unknown = inner.resolve(&ApoContext {
            industry: Some("Underwater Basketry".to_string()),
            region: Some("r42".to_string()),
            ..Default::default()
        });
        assert_eq!(unknown, inner.resolve(&ApoContext::default()));

        // Known by one table only still counts; case folds
        let known = inner.resolve(&ApoContext {
            industry: Some(" FINANCE ".to_string()),
            region: Some("APAC".to_string()),
            ..Default::default()
        });
        assert_eq!(known.industry.as_deref(), Some("finance"));
        assert_eq!(known.region.as_deref(), Some("apac"));

        let oceania = inner.resolve(&ApoContext {
            region: Some("Oceania".to_string()),
            ..Default::default()
        });
        assert_eq!(oceania.region.as_deref(), Some("oceania"));
    }

    #[tokio::test]
    async fn test_skill_obsolescence_validation() {
        let engine = ApoEngine::new(EngineConfig::default(), EngineSources::mock_only());
        assert!(engine.skill_obsolescence(&["Leadership".to_string()], 0).is_err());
        assert!(engine.skill_obsolescence(&[" ".to_string()], 5).is_err());
        let timeline = engine
            .skill_obsolescence(&["Leadership".to_string()], 5)
            .unwrap();
        assert_eq!(timeline["Leadership"].len(), 5);
    }

    #[test]
    fn test_growth_timelines_and_region_comparison() {
        let engine = ApoEngine::new(EngineConfig::default(), EngineSources::mock_only());

        let timelines = engine
            .growth_timelines(Some("Technology"), Some("Africa"), 3)
            .unwrap();
        assert_eq!(timelines.industry_timeline.len(), 3);
        assert!((timelines.industry_timeline[0] - 1.08).abs() < 1e-9);
        assert!((timelines.regional_timeline[0] - 1.03).abs() < 1e-9);
        assert!(engine.growth_timelines(None, None, 0).is_err());

        let ranked = engine
            .compare_regions(&["Africa".to_string(), "NA".to_string()])
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].ranking, 1);
        assert!(engine.compare_regions(&["Atlantis".to_string()]).is_err());
        assert!(engine.compare_regions(&[" ".to_string()]).is_err());
    }
}
