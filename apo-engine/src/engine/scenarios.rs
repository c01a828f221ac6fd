//! What-if scenarios
//!
//! A scenario scales the weight of five feature groups. The scaled weights are
//! renormalized and blended through per-group sensitivities; the ratio against
//! the neutral weighting scales the baseline score and its projections.
//!
//! ```text
//! w'_i  = base_i·m_i / Σ base_j·m_j
//! ratio = Σ w'_i·s_i / Σ base_i·s_i
//! score = clamp(baseline·ratio, 0, 100)
//! ```
//!
//! Only relative emphasis matters: multiplying every group by the same factor
//! leaves the score unchanged.

use serde::{Deserialize, Serialize};

use crate::types::{ApoError, TimeProjection};

use super::PROJECTION_YEARS;

/// Most scenarios accepted in one request
pub const MAX_SCENARIOS: usize = 10;

/// Longest scenario projection offset (years)
pub const MAX_SCENARIO_HORIZON_YEARS: u32 = 50;

/// Neutral feature-group weighting
pub const BASE_WEIGHTS: ScenarioWeights = ScenarioWeights {
    task_complexity: 0.25,
    collaboration_requirements: 0.20,
    industry_adoption: 0.25,
    emerging_tech_impact: 0.20,
    regional_factors: 0.10,
};

/// How strongly each group pushes automation potential
const SENSITIVITY: ScenarioWeights = ScenarioWeights {
    task_complexity: 1.1,
    collaboration_requirements: 0.9,
    industry_adoption: 1.2,
    emerging_tech_impact: 1.3,
    regional_factors: 1.0,
};

/// Weight per feature group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioWeights {
    pub task_complexity: f64,
    pub collaboration_requirements: f64,
    pub industry_adoption: f64,
    pub emerging_tech_impact: f64,
    pub regional_factors: f64,
}

impl ScenarioWeights {
    fn values(&self) -> [f64; 5] {
        [
            self.task_complexity,
            self.collaboration_requirements,
            self.industry_adoption,
            self.emerging_tech_impact,
            self.regional_factors,
        ]
    }

    fn from_values([a, b, c, d, e]: [f64; 5]) -> Self {
        Self {
            task_complexity: a,
            collaboration_requirements: b,
            industry_adoption: c,
            emerging_tech_impact: d,
            regional_factors: e,
        }
    }

    fn dot(&self, other: &Self) -> f64 {
        self.values()
            .iter()
            .zip(other.values())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Multiplier per feature group; absent groups stay at 1.0
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactorAdjustments {
    pub task_complexity: Option<f64>,
    pub collaboration_requirements: Option<f64>,
    pub industry_adoption: Option<f64>,
    pub emerging_tech_impact: Option<f64>,
    pub regional_factors: Option<f64>,
}

impl FactorAdjustments {
    fn multipliers(&self) -> [f64; 5] {
        [
            self.task_complexity,
            self.collaboration_requirements,
            self.industry_adoption,
            self.emerging_tech_impact,
            self.regional_factors,
        ]
        .map(|m| m.unwrap_or(1.0))
    }

    /// Renormalized weights under these multipliers
    pub fn weights(&self) -> ScenarioWeights {
        let scaled: Vec<f64> = BASE_WEIGHTS
            .values()
            .iter()
            .zip(self.multipliers())
            .map(|(w, m)| w * m)
            .collect();
        let total: f64 = scaled.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return BASE_WEIGHTS;
        }
        ScenarioWeights::from_values([
            scaled[0] / total,
            scaled[1] / total,
            scaled[2] / total,
            scaled[3] / total,
            scaled[4] / total,
        ])
    }

    /// Score multiplier relative to the neutral weighting
    pub fn ratio(&self) -> f64 {
        self.weights().dot(&SENSITIVITY) / BASE_WEIGHTS.dot(&SENSITIVITY)
    }

    fn validate(&self) -> Result<(), ApoError> {
        let multipliers = self.multipliers();
        if let Some(bad) = multipliers.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(ApoError::Validation(format!(
                "factor adjustments must be non-negative numbers, got {}",
                bad
            )));
        }
        if multipliers.iter().all(|m| *m == 0.0) {
            return Err(ApoError::Validation(
                "factor adjustments must not all be zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_horizons() -> Vec<u32> {
    PROJECTION_YEARS.to_vec()
}

/// One what-if scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioParams {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub factor_adjustments: FactorAdjustments,
    /// Offsets beyond the requested timeframe, in years
    #[serde(default = "default_horizons")]
    pub time_horizon_years: Vec<u32>,
}

impl ScenarioParams {
    pub fn validate(&self) -> Result<(), ApoError> {
        if self.name.trim().is_empty() {
            return Err(ApoError::Validation("scenario name must not be empty".to_string()));
        }
        if let Some(bad) = self
            .time_horizon_years
            .iter()
            .find(|y| **y == 0 || **y > MAX_SCENARIO_HORIZON_YEARS)
        {
            return Err(ApoError::Validation(format!(
                "scenario {:?}: horizons must be in 1..={}, got {}",
                self.name, MAX_SCENARIO_HORIZON_YEARS, bad
            )));
        }
        self.factor_adjustments.validate().map_err(|e| match e {
            ApoError::Validation(msg) => {
                ApoError::Validation(format!("scenario {:?}: {}", self.name, msg))
            }
        })
    }
}

/// Check a whole request
pub fn validate_scenarios(scenarios: &[ScenarioParams]) -> Result<(), ApoError> {
    if scenarios.is_empty() || scenarios.len() > MAX_SCENARIOS {
        return Err(ApoError::Validation(format!(
            "between 1 and {} scenarios are required, got {}",
            MAX_SCENARIOS,
            scenarios.len()
        )));
    }
    scenarios.iter().try_for_each(ScenarioParams::validate)
}

/// Scenario outcome next to the baseline it adjusts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub scenario_description: String,
    /// 0-100
    pub baseline_score: f64,
    /// 0-100
    pub adjusted_score: f64,
    /// 0-100
    pub confidence: f64,
    pub weights: ScenarioWeights,
    pub time_projections: Vec<TimeProjection>,
}
