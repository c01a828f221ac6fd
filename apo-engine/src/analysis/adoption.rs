//! Technology adoption analysis
//!
//! Converts adoption indicators into an impact multiplier and advisory insights.
//! All rates and scores here are on the 0-1 scale.
//!
//! ```text
//! impact = clamp(base·(1 + 0.4·industry + 0.3·trend + 0.3·forecast), 0, 1)
//! ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::mean;
use crate::types::{clamp_unit, HistoricalDataPoint, ResearchSnippet, TechnologySkill};

/// Periods considered by the trend term
const TREND_WINDOW: usize = 4;

/// Industry adoption baselines used when deriving adoption from signals
const INDUSTRY_BASELINES: &[(&str, f64)] = &[
    ("Technology", 0.72),
    ("Finance", 0.65),
    ("Manufacturing", 0.58),
    ("Retail", 0.52),
    ("Healthcare", 0.48),
    ("Agriculture", 0.35),
    ("Education", 0.38),
    ("Construction", 0.30),
];

/// Observed adoption rate at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionTrendPoint {
    pub date: DateTime<Utc>,
    pub rate: f64,
    pub milestone: Option<String>,
}

/// Adoption rate within one industry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryAdoptionRate {
    pub industry: String,
    pub rate: f64,
    pub leading_factors: Vec<String>,
    pub barriers: Vec<String>,
}

/// Forces acting on adoption (each 0-1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionImpactFactors {
    pub cost_factor: f64,
    pub skill_requirement: f64,
    pub infrastructure_needs: f64,
    pub regulatory_compliance: f64,
    pub market_demand: f64,
}

/// Predicted adoption rate for a future year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionForecast {
    pub year: i32,
    pub predicted_rate: f64,
    pub confidence: f64,
    pub driving_factors: Vec<String>,
}

/// Adoption profile of a technology (or technology cluster)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyAdoption {
    pub id: String,
    pub name: String,
    pub current_adoption_rate: f64,
    pub historical_trend: Vec<AdoptionTrendPoint>,
    pub industry_rates: Vec<IndustryAdoptionRate>,
    pub impact_factors: AdoptionImpactFactors,
    pub forecast: Vec<AdoptionForecast>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdoptionInsightKind {
    Opportunity,
    Risk,
    Trend,
}

/// Advisory adoption insight; never feeds back into the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionInsight {
    #[serde(rename = "type")]
    pub kind: AdoptionInsightKind,
    pub description: String,
    pub impact: f64,
    pub timeframe: String,
    pub action_items: Vec<String>,
}

/// Adoption analyzer
///
/// **Default Weights:**
/// - Industry rate: 40%
/// - Historical trend: 30%
/// - Forecast: 30%
///
/// **Insight Thresholds:**
/// - Rapid growth: overall growth rate > 0.2 per period
/// - Skills risk: skill requirement > 0.7
#[derive(Debug, Clone)]
pub struct AdoptionAnalyzer {
    industry_weight: f64,
    trend_weight: f64,
    forecast_weight: f64,
    rapid_growth_threshold: f64,
    skill_risk_threshold: f64,
}

impl Default for AdoptionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl AdoptionAnalyzer {
    pub fn new() -> Self {
        Self {
            industry_weight: 0.4,
            trend_weight: 0.3,
            forecast_weight: 0.3,
            rapid_growth_threshold: 0.2,
            skill_risk_threshold: 0.7,
        }
    }

    /// Adjust a 0-1 base score by the adoption profile
    pub fn calculate_impact(
        &self,
        base_score: f64,
        adoption: &TechnologyAdoption,
        industry: Option<&str>,
    ) -> f64 {
        let industry_rate = industry_rate(adoption, industry);
        let trend = trend_impact(&adoption.historical_trend);
        let forecast = forecast_impact(&adoption.forecast);

        let multiplier = 1.0
            + industry_rate * self.industry_weight
            + trend * self.trend_weight
            + forecast * self.forecast_weight;

        clamp_unit(clamp_unit(base_score) * multiplier)
    }

    /// Advisory insights for an adoption profile
    pub fn generate_insights(
        &self,
        adoption: &TechnologyAdoption,
        industry: Option<&str>,
    ) -> Vec<AdoptionInsight> {
        let mut insights = Vec::new();

        if industry_rate(adoption, industry) < adoption.current_adoption_rate {
            insights.push(AdoptionInsight {
                kind: AdoptionInsightKind::Opportunity,
                description:
                    "Industry adoption rate below average - opportunity for early adoption advantage"
                        .to_string(),
                impact: 0.8,
                timeframe: "Short-term".to_string(),
                action_items: strings(&[
                    "Assess implementation costs",
                    "Identify skill gaps",
                    "Plan pilot program",
                ]),
            });
        }

        if growth_rate(&adoption.historical_trend) > self.rapid_growth_threshold {
            insights.push(AdoptionInsight {
                kind: AdoptionInsightKind::Trend,
                description:
                    "Technology showing rapid adoption growth - consider prioritizing implementation"
                        .to_string(),
                impact: 0.9,
                timeframe: "Medium-term".to_string(),
                action_items: strings(&[
                    "Develop adoption strategy",
                    "Allocate resources",
                    "Create training program",
                ]),
            });
        }

        if adoption.impact_factors.skill_requirement > self.skill_risk_threshold {
            insights.push(AdoptionInsight {
                kind: AdoptionInsightKind::Risk,
                description: "High skill requirements may pose adoption challenges".to_string(),
                impact: 0.7,
                timeframe: "Medium-term".to_string(),
                action_items: strings(&[
                    "Assess current skill levels",
                    "Identify training needs",
                    "Consider hiring requirements",
                ]),
            });
        }

        insights
    }

    /// Periods until the adoption rate reaches `target_rate`
    ///
    /// `None` when the history shows no growth.
    pub fn predict_adoption_timeline(
        &self,
        adoption: &TechnologyAdoption,
        target_rate: f64,
    ) -> Option<u32> {
        let latest = adoption.historical_trend.last()?;
        let growth = growth_rate(&adoption.historical_trend);
        if growth <= 0.0 || !growth.is_finite() {
            return None;
        }

        let gap = target_rate - latest.rate;
        if gap <= 0.0 {
            return Some(0);
        }
        Some((gap / growth).ceil() as u32)
    }

    /// Build an adoption profile from the engine's gathered signals
    ///
    /// Historical technology adoption supplies the trend, hot technologies the
    /// skill requirement, and quoted automation percentages the forecast.
    pub fn adoption_from_signals(
        &self,
        name: &str,
        series: &[HistoricalDataPoint],
        technologies: &[TechnologySkill],
        research: &[ResearchSnippet],
    ) -> TechnologyAdoption {
        let historical_trend: Vec<AdoptionTrendPoint> = series
            .iter()
            .map(|point| AdoptionTrendPoint {
                date: point.timestamp,
                rate: clamp_unit(point.metrics.technology_adoption / 100.0),
                milestone: None,
            })
            .collect();

        let hot_share = if technologies.is_empty() {
            0.0
        } else {
            technologies.iter().filter(|t| t.hot_technology).count() as f64
                / technologies.len() as f64
        };

        let current_adoption_rate = historical_trend
            .last()
            .map(|p| p.rate)
            .unwrap_or_else(|| clamp_unit(0.3 + 0.5 * hot_share));

        let market_demand = if series.is_empty() {
            0.5
        } else {
            let demand: Vec<f64> = series.iter().map(|p| p.metrics.market_demand / 100.0).collect();
            clamp_unit(mean(&demand))
        };

        let impact_factors = AdoptionImpactFactors {
            cost_factor: 0.5,
            skill_requirement: clamp_unit(0.3 + 0.6 * hot_share),
            infrastructure_needs: clamp_unit(technologies.len() as f64 / 20.0),
            regulatory_compliance: 0.3,
            market_demand,
        };

        let current_year = Utc::now().year();
        let forecast = research
            .iter()
            .filter_map(|snippet| {
                let pct = snippet.automation_percentage?;
                Some(AdoptionForecast {
                    year: snippet.year.unwrap_or(current_year).max(current_year),
                    predicted_rate: clamp_unit(pct / 100.0),
                    confidence: clamp_unit(snippet.relevance),
                    driving_factors: vec![snippet.source.clone()],
                })
            })
            .collect();

        let industry_rates = INDUSTRY_BASELINES
            .iter()
            .map(|(industry, rate)| IndustryAdoptionRate {
                industry: industry.to_string(),
                rate: *rate,
                leading_factors: Vec::new(),
                barriers: Vec::new(),
            })
            .collect();

        TechnologyAdoption {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            current_adoption_rate,
            historical_trend,
            industry_rates,
            impact_factors,
            forecast,
        }
    }
}

/// Whether `industry` has an adoption baseline
pub fn is_known_industry(industry: &str) -> bool {
    INDUSTRY_BASELINES
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case(industry.trim()))
}

/// Industry-specific rate, falling back to the overall current rate
pub fn industry_rate(adoption: &TechnologyAdoption, industry: Option<&str>) -> f64 {
    industry
        .and_then(|name| {
            adoption
                .industry_rates
                .iter()
                .find(|r| r.industry.eq_ignore_ascii_case(name.trim()))
        })
        .map(|r| r.rate)
        .unwrap_or(adoption.current_adoption_rate)
}

/// Mean period-over-period growth across the last four periods, doubled
///
/// The first entry of the window contributes 0. Clamped to [0, 1].
pub fn trend_impact(trend: &[AdoptionTrendPoint]) -> f64 {
    if trend.len() < 2 {
        return 0.0;
    }

    let window = &trend[trend.len().saturating_sub(TREND_WINDOW)..];
    let ratios: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(i, point)| {
            if i == 0 {
                return 0.0;
            }
            let previous = window[i - 1].rate;
            if previous > 0.0 {
                (point.rate - previous) / previous
            } else {
                0.0
            }
        })
        .collect();

    clamp_unit(mean(&ratios) * 2.0)
}

/// Mean of confidence-weighted forecast rates, clamped to [0, 1]
pub fn forecast_impact(forecasts: &[AdoptionForecast]) -> f64 {
    let weighted: Vec<f64> = forecasts
        .iter()
        .map(|f| f.predicted_rate * f.confidence)
        .collect();
    clamp_unit(mean(&weighted))
}

/// Overall growth per period: `(last - first) / (first · periods)`
pub fn growth_rate(trend: &[AdoptionTrendPoint]) -> f64 {
    let (Some(first), Some(last)) = (trend.first(), trend.last()) else {
        return 0.0;
    };
    if trend.len() < 2 || first.rate <= 0.0 {
        return 0.0;
    }
    let periods = (trend.len() - 1) as f64;
    (last.rate - first.rate) / (first.rate * periods)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const EPS: f64 = 1e-9;

    fn profile(current: f64, rates: &[f64]) -> TechnologyAdoption {
        let start = Utc::now();
        TechnologyAdoption {
            id: "robotics".to_string(),
            name: "Robotics".to_string(),
            current_adoption_rate: current,
            historical_trend: rates
                .iter()
                .enumerate()
                .map(|(i, rate)| AdoptionTrendPoint {
                    date: start + Duration::days(90 * i as i64),
                    rate: *rate,
                    milestone: None,
                })
                .collect(),
            industry_rates: vec![IndustryAdoptionRate {
                industry: "Manufacturing".to_string(),
                rate: 0.6,
                leading_factors: vec![],
                barriers: vec![],
            }],
            impact_factors: AdoptionImpactFactors {
                cost_factor: 0.5,
                skill_requirement: 0.5,
                infrastructure_needs: 0.5,
                regulatory_compliance: 0.5,
                market_demand: 0.5,
            },
            forecast: vec![],
        }
    }

    #[test]
    fn test_industry_only_impact() {
        let analyzer = AdoptionAnalyzer::new();
        let adoption = profile(0.4, &[]);
        // 0.5 · (1 + 0.4·0.6)
        let impact = analyzer.calculate_impact(0.5, &adoption, Some("Manufacturing"));
        assert!((impact - 0.62).abs() < EPS);
    }

    #[test]
    fn test_unknown_industry_uses_current_rate() {
        let adoption = profile(0.4, &[]);
        assert_eq!(industry_rate(&adoption, Some("Fishing")), 0.4);
        assert_eq!(industry_rate(&adoption, None), 0.4);
        assert_eq!(industry_rate(&adoption, Some("manufacturing")), 0.6);

        assert!(is_known_industry("Healthcare"));
        assert!(!is_known_industry("Fishing"));
    }

    #[test]
    fn test_trend_impact_window() {
        // Window [0.2, 0.25, 0.3, 0.36] → ratios [0, 0.25, 0.2, 0.2]
        let adoption = profile(0.36, &[0.1, 0.2, 0.25, 0.3, 0.36]);
        let expected = (0.0 + 0.25 + 0.2 + 0.2) / 4.0 * 2.0;
        assert!((trend_impact(&adoption.historical_trend) - expected).abs() < EPS);
        assert_eq!(trend_impact(&profile(0.1, &[0.1]).historical_trend), 0.0);
    }

    #[test]
    fn test_trend_impact_clamped() {
        let rising = profile(0.9, &[0.1, 0.5, 0.9]);
        assert_eq!(trend_impact(&rising.historical_trend), 1.0);
        let falling = profile(0.1, &[0.9, 0.5, 0.1]);
        assert_eq!(trend_impact(&falling.historical_trend), 0.0);
    }

    #[test]
    fn test_forecast_impact() {
        let forecasts = vec![
            AdoptionForecast {
                year: 2030,
                predicted_rate: 0.8,
                confidence: 0.5,
                driving_factors: vec![],
            },
            AdoptionForecast {
                year: 2031,
                predicted_rate: 0.6,
                confidence: 1.0,
                driving_factors: vec![],
            },
        ];
        assert!((forecast_impact(&forecasts) - 0.5).abs() < EPS);
        assert_eq!(forecast_impact(&[]), 0.0);
    }

    #[test]
    fn test_impact_bounded() {
        let analyzer = AdoptionAnalyzer::new();
        let adoption = profile(0.9, &[0.1, 0.5, 0.9]);
        assert_eq!(analyzer.calculate_impact(0.9, &adoption, Some("Manufacturing")), 1.0);
        assert_eq!(analyzer.calculate_impact(f64::NAN, &adoption, None), 0.0);
    }

    #[test]
    fn test_insights() {
        let analyzer = AdoptionAnalyzer::new();
        let mut adoption = profile(0.7, &[0.2, 0.3, 0.4]);
        adoption.impact_factors.skill_requirement = 0.8;

        let insights = analyzer.generate_insights(&adoption, Some("Manufacturing"));
        let kinds: Vec<_> = insights.iter().map(|i| i.kind).collect();
        // 0.6 < 0.7, growth (0.4-0.2)/(0.2·2) = 0.5, skill 0.8
        assert_eq!(
            kinds,
            vec![
                AdoptionInsightKind::Opportunity,
                AdoptionInsightKind::Trend,
                AdoptionInsightKind::Risk
            ]
        );

        let quiet = profile(0.5, &[0.5, 0.5]);
        assert!(analyzer.generate_insights(&quiet, Some("Manufacturing")).is_empty());
    }

    #[test]
    fn test_predict_adoption_timeline() {
        let analyzer = AdoptionAnalyzer::new();
        // growth = (0.4-0.2)/(0.2·2) = 0.5 per period; gap 0.55 → 2 periods
        let adoption = profile(0.4, &[0.2, 0.3, 0.4]);
        assert_eq!(analyzer.predict_adoption_timeline(&adoption, 0.95), Some(2));
        assert_eq!(analyzer.predict_adoption_timeline(&adoption, 0.3), Some(0));

        let flat = profile(0.4, &[0.4, 0.4]);
        assert_eq!(analyzer.predict_adoption_timeline(&flat, 0.9), None);
        assert_eq!(analyzer.predict_adoption_timeline(&profile(0.4, &[]), 0.9), None);
    }

    #[test]
    fn test_adoption_from_signals() {
        let analyzer = AdoptionAnalyzer::new();
        let technologies = vec![
            TechnologySkill {
                name: "Python".to_string(),
                category: "Programming".to_string(),
                hot_technology: true,
            },
            TechnologySkill {
                name: "Excel".to_string(),
                category: "Spreadsheet".to_string(),
                hot_technology: false,
            },
        ];
        let research = vec![ResearchSnippet {
            title: "Study".to_string(),
            source: "example.org".to_string(),
            snippet: "45% of tasks automatable".to_string(),
            year: Some(2020),
            automation_percentage: Some(45.0),
            relevance: 0.8,
        }];

        let adoption = analyzer.adoption_from_signals("Software Developers", &[], &technologies, &research);

        assert_eq!(adoption.id, "software-developers");
        assert!((adoption.current_adoption_rate - 0.55).abs() < EPS);
        assert!((adoption.impact_factors.skill_requirement - 0.6).abs() < EPS);
        assert_eq!(adoption.forecast.len(), 1);
        assert!((adoption.forecast[0].predicted_rate - 0.45).abs() < EPS);
        assert!(adoption.forecast[0].year >= Utc::now().year());
        assert!(industry_rate(&adoption, Some("Technology")) > 0.7);
    }
}
