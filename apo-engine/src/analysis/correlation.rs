//! Historical factor correlation
//!
//! Pearson correlation between the APO series and each per-point driver
//! (technology impact, industry adoption, market growth) inside a time window.
//! Coefficients are in [-1, 1]; confidence and reliability are 0-1.
//!
//! ```text
//! reliability = 0.6·(1 - stddev(gaps)/mean(gaps)) + 0.4·min(1, n/3)
//! confidence  = 0.6·min(1, n/6) + 0.4·reliability
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::mean;
use crate::types::{HistoricalDataPoint, TrendDirection};

/// Fewest points analyzed; shorter windows get the low-confidence result
pub const MIN_DATA_POINTS: usize = 3;

/// |r| at or above which a driver is reported as a key factor
pub const KEY_FACTOR_THRESHOLD: f64 = 0.7;

/// |r| of the APO-vs-position correlation below which the series is stable
const TREND_THRESHOLD: f64 = 0.05;

const LOW_CONFIDENCE: f64 = 0.3;

/// Correlation summary over a window of the historical series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    /// Mean |r| across drivers
    pub correlation_score: f64,
    pub confidence: f64,
    pub trend_direction: TrendDirection,
    /// Drivers with |r| ≥ 0.7
    pub key_factors: Vec<String>,
    pub reliability: f64,
    /// Driver → r
    pub factor_correlations: BTreeMap<String, f64>,
    pub data_points: usize,
}

impl CorrelationResult {
    /// Result for a window too short to analyze
    pub fn low_confidence(data_points: usize) -> Self {
        Self {
            correlation_score: 0.0,
            confidence: LOW_CONFIDENCE,
            trend_direction: TrendDirection::Stable,
            key_factors: Vec::new(),
            reliability: LOW_CONFIDENCE,
            factor_correlations: BTreeMap::new(),
            data_points,
        }
    }
}

/// Correlation analyzer
#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    min_data_points: usize,
    key_factor_threshold: f64,
}

impl Default for CorrelationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationAnalyzer {
    pub fn new() -> Self {
        Self {
            min_data_points: MIN_DATA_POINTS,
            key_factor_threshold: KEY_FACTOR_THRESHOLD,
        }
    }

    /// Analyze the points at or after `since`
    ///
    /// The series need not be sorted.
    pub fn analyze(&self, series: &[HistoricalDataPoint], since: DateTime<Utc>) -> CorrelationResult {
        let mut window: Vec<&HistoricalDataPoint> =
            series.iter().filter(|p| p.timestamp >= since).collect();
        if window.len() < self.min_data_points {
            return CorrelationResult::low_confidence(window.len());
        }
        window.sort_by_key(|p| p.timestamp);

        let apo: Vec<f64> = window.iter().map(|p| p.metrics.apo).collect();
        let drivers: [(&str, Vec<f64>); 3] = [
            (
                "technologyImpact",
                window.iter().map(|p| p.factors.technology_impact).collect(),
            ),
            (
                "industryAdoption",
                window.iter().map(|p| p.factors.industry_adoption).collect(),
            ),
            (
                "marketGrowth",
                window.iter().map(|p| p.factors.market_growth).collect(),
            ),
        ];

        let factor_correlations: BTreeMap<String, f64> = drivers
            .iter()
            .map(|(name, values)| (name.to_string(), pearson(&apo, values)))
            .collect();

        let magnitudes: Vec<f64> = factor_correlations.values().map(|r| r.abs()).collect();
        let key_factors = factor_correlations
            .iter()
            .filter(|(_, r)| r.abs() >= self.key_factor_threshold)
            .map(|(name, _)| name.clone())
            .collect();

        let positions: Vec<f64> = (0..apo.len()).map(|i| i as f64).collect();
        let trend = pearson(&positions, &apo);
        let trend_direction = if trend > TREND_THRESHOLD {
            TrendDirection::Increasing
        } else if trend < -TREND_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let reliability = self.reliability(&window);
        let coverage = (window.len() as f64 / (self.min_data_points * 2) as f64).min(1.0);

        CorrelationResult {
            correlation_score: mean(&magnitudes),
            confidence: coverage * 0.6 + reliability * 0.4,
            trend_direction,
            key_factors,
            reliability,
            factor_correlations,
            data_points: window.len(),
        }
    }

    /// Spacing regularity blended with point coverage
    fn reliability(&self, window: &[&HistoricalDataPoint]) -> f64 {
        let gaps: Vec<f64> = window
            .windows(2)
            .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_seconds() as f64)
            .collect();
        let average = mean(&gaps);
        let consistency = if average > 0.0 {
            let variance = gaps.iter().map(|g| (g - average).powi(2)).sum::<f64>() / gaps.len() as f64;
            (1.0 - variance.sqrt() / average).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let coverage = (window.len() as f64 / self.min_data_points as f64).min(1.0);

        consistency * 0.6 + coverage * 0.4
    }
}

/// Pearson r; 0 for mismatched lengths, fewer than two points or zero variance
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || n != y.len() {
        return 0.0;
    }
    let (x_mean, y_mean) = (mean(x), mean(y));

    let (covariance, x_var, y_var) = x.iter().zip(y).fold((0.0, 0.0, 0.0), |(c, vx, vy), (a, b)| {
        let (dx, dy) = (a - x_mean, b - y_mean);
        (c + dx * dy, vx + dx * dx, vy + dy * dy)
    });

    let denominator = (x_var * y_var).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        (covariance / denominator).clamp(-1.0, 1.0)
    }
}
