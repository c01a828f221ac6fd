//! Trend analysis and APO forecasting
//!
//! Ordinary least squares over historical APO scores with the point's position
//! as x. The forecast extends the last observed score by `slope × months`.

use std::collections::HashMap;

use crate::analysis::mean;
use crate::types::{
    clamp_score, AutomationFactor, AutomationTrend, FactorTrend, TrendDirection,
};

/// Base APO when no history is available
pub const DEFAULT_BASE_APO: f64 = 50.0;

/// Slope magnitude below which a series is considered stable
pub const STABLE_SLOPE_THRESHOLD: f64 = 0.1;

/// Months of history needed for full trend consistency
const FULL_HISTORY_POINTS: f64 = 12.0;

const FACTOR_CONSISTENCY_WEIGHT: f64 = 0.4;
const TREND_CONSISTENCY_WEIGHT: f64 = 0.6;

/// Forecast output
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPrediction {
    /// 0-100
    pub predicted_apo: f64,
    /// 0-100
    pub confidence: f64,
    pub slope: f64,
    pub direction: TrendDirection,
    pub factor_trends: Vec<FactorTrend>,
    pub timeframe_months: u32,
}

/// OLS trend analyzer
#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Forecast APO `months` ahead from the history and the active factor set
    pub fn predict(
        &self,
        history: &[AutomationTrend],
        factors: &[AutomationFactor],
        months: u32,
    ) -> TrendPrediction {
        let scores: Vec<f64> = history.iter().map(|t| t.apo_score).collect();
        let slope = slope(&scores);
        let base = scores.last().copied().unwrap_or(DEFAULT_BASE_APO);
        let predicted_apo = clamp_score(base + slope * f64::from(months));

        let per_factor = classify_factors(history);
        let factor_trends = factors
            .iter()
            .map(|factor| FactorTrend {
                name: factor.name.clone(),
                impact: factor.weight * 100.0,
                trend: per_factor
                    .get(factor.name.as_str())
                    .copied()
                    .unwrap_or(TrendDirection::Stable),
            })
            .collect();

        TrendPrediction {
            predicted_apo,
            confidence: confidence(history.len(), factors),
            slope,
            direction: direction_of(slope),
            factor_trends,
            timeframe_months: months,
        }
    }
}

/// OLS slope with x = position; 0 for fewer than two points or zero variance
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = mean(values);

    let (numerator, denominator) =
        values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, y)| {
                let dx = i as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });

    if denominator == 0.0 || !numerator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// Classify a slope as increasing, decreasing or stable
pub fn direction_of(slope: f64) -> TrendDirection {
    if slope > STABLE_SLOPE_THRESHOLD {
        TrendDirection::Increasing
    } else if slope < -STABLE_SLOPE_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// `(meanFactorWeight·0.4 + min(1, n/12)·0.6)·100`
pub fn confidence(data_points: usize, factors: &[AutomationFactor]) -> f64 {
    let weights: Vec<f64> = factors.iter().map(|f| f.weight).collect();
    let factor_consistency = mean(&weights);
    let trend_consistency = (data_points as f64 / FULL_HISTORY_POINTS).min(1.0);

    clamp_score(
        (factor_consistency * FACTOR_CONSISTENCY_WEIGHT
            + trend_consistency * TREND_CONSISTENCY_WEIGHT)
            * 100.0,
    )
}

/// Slope of APO scores over the points each factor is tagged on
fn classify_factors(history: &[AutomationTrend]) -> HashMap<&str, TrendDirection> {
    let mut series: HashMap<&str, Vec<f64>> = HashMap::new();
    for point in history {
        for factor in &point.factors {
            series.entry(factor.as_str()).or_default().push(point.apo_score);
        }
    }

    series
        .into_iter()
        .map(|(name, scores)| (name, direction_of(slope(&scores))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trend(score: f64, factors: &[&str]) -> AutomationTrend {
        AutomationTrend {
            date: Utc::now(),
            apo_score: score,
            factors: factors.iter().map(|f| f.to_string()).collect(),
            confidence: 0.8,
            industry_impact: 0.5,
            technology_adoption: 0.5,
        }
    }

    fn factor(name: &str, weight: f64) -> AutomationFactor {
        AutomationFactor {
            id: name.to_lowercase(),
            name: name.to_string(),
            category: "task".to_string(),
            weight,
            complexity: 3.0,
            repetitiveness: 0.5,
            human_ai_collaboration: 0.5,
            emerging_tech_impact: 0.5,
            industry_specific: false,
        }
    }

    #[test]
    fn test_linear_series_slope_and_forecast() {
        let history: Vec<_> = [40.0, 42.0, 44.0, 46.0].iter().map(|s| trend(*s, &[])).collect();
        let prediction = TrendAnalyzer::new().predict(&history, &[], 6);

        assert!((prediction.slope - 2.0).abs() < 1e-9);
        assert!((prediction.predicted_apo - 58.0).abs() < 1e-9);
        assert_eq!(prediction.direction, TrendDirection::Increasing);
    }

    #[test]
    fn test_short_series_has_zero_slope() {
        assert_eq!(slope(&[]), 0.0);
        assert_eq!(slope(&[73.0]), 0.0);
        assert_eq!(slope(&[10.0, 10.0, 10.0]), 0.0);
    }

    #[test]
    fn test_empty_history_uses_default_base() {
        let prediction = TrendAnalyzer::new().predict(&[], &[], 6);
        assert_eq!(prediction.predicted_apo, DEFAULT_BASE_APO);
        // No factors, no data: zero confidence
        assert_eq!(prediction.confidence, 0.0);
    }

    #[test]
    fn test_forecast_non_decreasing_in_horizon() {
        let history: Vec<_> = [10.0, 15.0, 21.0, 30.0].iter().map(|s| trend(*s, &[])).collect();
        let analyzer = TrendAnalyzer::new();
        let mut last = 0.0;
        for months in 1..=24 {
            let predicted = analyzer.predict(&history, &[], months).predicted_apo;
            assert!(predicted >= last);
            last = predicted;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_forecast_clamped_low() {
        let history: Vec<_> = [30.0, 20.0, 10.0].iter().map(|s| trend(*s, &[])).collect();
        let prediction = TrendAnalyzer::new().predict(&history, &[], 12);
        assert_eq!(prediction.predicted_apo, 0.0);
        assert_eq!(prediction.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn test_confidence_formula() {
        let factors = vec![factor("A", 0.6), factor("B", 0.4)];
        // mean weight 0.5 → 0.2; 6/12 → 0.3
        assert!((confidence(6, &factors) - 50.0).abs() < 1e-9);
        // More than 12 points saturates
        assert!((confidence(24, &factors) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_factor_classification() {
        let history = vec![
            trend(40.0, &["Routine Tasks", "Social Interaction"]),
            trend(45.0, &["Routine Tasks"]),
            trend(40.0, &["Social Interaction"]),
            trend(50.0, &["Routine Tasks"]),
            trend(30.0, &["Social Interaction"]),
        ];
        let factors = vec![
            factor("Routine Tasks", 0.7),
            factor("Social Interaction", 0.3),
            factor("Unobserved", 0.2),
        ];

        let prediction = TrendAnalyzer::new().predict(&history, &factors, 6);
        let by_name: HashMap<_, _> = prediction
            .factor_trends
            .iter()
            .map(|f| (f.name.as_str(), f.trend))
            .collect();

        assert_eq!(by_name["Routine Tasks"], TrendDirection::Increasing);
        assert_eq!(by_name["Social Interaction"], TrendDirection::Decreasing);
        assert_eq!(by_name["Unobserved"], TrendDirection::Stable);
        assert!((prediction.factor_trends[0].impact - 70.0).abs() < 1e-9);
    }
}
