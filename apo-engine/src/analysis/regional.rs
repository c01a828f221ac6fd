//! Regional market analysis
//!
//! Scores on the 0-1 scale. Four impact figures (market, labor, tech hub, cost
//! of living) are averaged and applied around a neutral midpoint:
//!
//! ```text
//! result = clamp(base·(1 + (avg - 0.5)), 0, 1)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::clamp_unit;

/// Region code of the profile used for unknown regions
pub const DEFAULT_REGION_CODE: &str = "GLOBAL";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndicators {
    /// Annual GDP growth, percent
    pub gdp_growth: f64,
    /// 0-1
    pub employment_rate: f64,
    /// 0-1
    pub industry_growth: f64,
    /// 0-1
    pub innovation_index: f64,
    /// 0-1
    pub market_size: f64,
    /// 0-1
    pub competitive_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborStatistics {
    /// Percent
    pub unemployment_rate: f64,
    pub average_salary: f64,
    /// 0-1
    pub skill_gap_index: f64,
    pub workforce_size: f64,
    /// 0-1
    pub labor_demand: f64,
    /// Skill category → availability ratio
    pub skill_availability: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechHubData {
    /// 0-1
    pub hub_score: f64,
    /// 0-1
    pub startup_density: f64,
    /// 0-1
    pub venture_capital: f64,
    pub research_institutions: u32,
    pub tech_companies: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostOfLivingData {
    /// 100 = global average
    pub index: f64,
    pub housing_cost: f64,
    pub transportation_cost: f64,
    pub utilities: f64,
    pub average_rent: f64,
}

/// Market profile of one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalMarketData {
    pub region_code: String,
    pub name: String,
    pub market_indicators: MarketIndicators,
    pub labor_stats: LaborStatistics,
    pub tech_hub: TechHubData,
    pub cost_of_living: CostOfLivingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionalInsightKind {
    Opportunity,
    Challenge,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightTimeframe {
    Short,
    Medium,
    Long,
}

/// Advisory regional insight; never feeds back into the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalInsight {
    #[serde(rename = "type")]
    pub kind: RegionalInsightKind,
    pub description: String,
    pub impact: f64,
    pub timeframe: InsightTimeframe,
    pub confidence: f64,
}

/// Ranked comparison entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalComparison {
    pub region_code: String,
    pub metrics: BTreeMap<String, f64>,
    /// 1 = strongest overall impact
    pub ranking: usize,
    pub strength_factors: Vec<String>,
    pub weakness_factors: Vec<String>,
}

/// Regional analyzer
///
/// **Market Weights:**
/// - GDP growth: 30% (percent / 10)
/// - Employment rate: 20%
/// - Industry growth: 20%
/// - Innovation index: 15%
/// - Market size: 10%
/// - Competitive index: 5%
#[derive(Debug, Clone)]
pub struct RegionalAnalyzer {
    profiles: Vec<RegionalMarketData>,
    default_profile: RegionalMarketData,
}

impl Default for RegionalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionalAnalyzer {
    /// Create analyzer with the built-in regional profiles
    pub fn new() -> Self {
        Self {
            profiles: build_profiles(),
            default_profile: default_profile(),
        }
    }

    /// Profile for a region name or code; the global default when unknown
    pub fn profile(&self, region: Option<&str>) -> &RegionalMarketData {
        region
            .and_then(|r| self.find(r))
            .unwrap_or(&self.default_profile)
    }

    /// Built-in profile matching a region name or code
    pub fn find(&self, region: &str) -> Option<&RegionalMarketData> {
        let region = region.trim();
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(region) || p.region_code.eq_ignore_ascii_case(region))
    }

    /// Adjust a 0-1 base score for a region
    pub fn calculate_impact(&self, base_score: f64, data: &RegionalMarketData) -> f64 {
        let average = overall_impact(data);
        clamp_unit(clamp_unit(base_score) * (1.0 + (average - 0.5)))
    }

    /// Advisory insights for a region
    pub fn generate_insights(&self, data: &RegionalMarketData) -> Vec<RegionalInsight> {
        let mut insights = Vec::new();

        if data.market_indicators.gdp_growth > 3.0 {
            insights.push(RegionalInsight {
                kind: RegionalInsightKind::Opportunity,
                description: "Strong market growth indicates expanding job opportunities".to_string(),
                impact: 0.8,
                timeframe: InsightTimeframe::Short,
                confidence: 0.85,
            });
        }

        if data.labor_stats.skill_gap_index > 0.6 {
            insights.push(RegionalInsight {
                kind: RegionalInsightKind::Challenge,
                description: "Significant skill gap in the region may require upskilling".to_string(),
                impact: 0.7,
                timeframe: InsightTimeframe::Medium,
                confidence: 0.9,
            });
        }

        if data.tech_hub.hub_score > 0.7 {
            insights.push(RegionalInsight {
                kind: RegionalInsightKind::Opportunity,
                description: "Strong tech hub presence offers innovation opportunities".to_string(),
                impact: 0.85,
                timeframe: InsightTimeframe::Long,
                confidence: 0.8,
            });
        }

        insights
    }

    /// Rank regions by their overall impact figure
    ///
    /// Metrics above 0.7 are listed as strengths, below 0.4 as weaknesses.
    pub fn compare_regions(&self, regions: &[RegionalMarketData]) -> Vec<RegionalComparison> {
        let scored: Vec<(&RegionalMarketData, BTreeMap<String, f64>)> = regions
            .iter()
            .map(|region| (region, region_metrics(region)))
            .collect();

        scored
            .iter()
            .map(|(region, metrics)| {
                let overall = metrics.get("overall").copied().unwrap_or(0.0);
                let ranking = 1 + scored
                    .iter()
                    .filter(|(_, other)| other.get("overall").copied().unwrap_or(0.0) > overall)
                    .count();

                let components = metrics.iter().filter(|(name, _)| name.as_str() != "overall");
                RegionalComparison {
                    region_code: region.region_code.clone(),
                    metrics: metrics.clone(),
                    ranking,
                    strength_factors: components
                        .clone()
                        .filter(|(_, v)| **v > 0.7)
                        .map(|(name, _)| name.clone())
                        .collect(),
                    weakness_factors: components
                        .filter(|(_, v)| **v < 0.4)
                        .map(|(name, _)| name.clone())
                        .collect(),
                }
            })
            .collect()
    }
}

/// Weighted market indicators, each normalized to [0, 1]
pub fn market_impact(m: &MarketIndicators) -> f64 {
    clamp_unit(
        clamp_unit(m.gdp_growth / 10.0) * 0.30
            + clamp_unit(m.employment_rate) * 0.20
            + clamp_unit(m.industry_growth) * 0.20
            + clamp_unit(m.innovation_index) * 0.15
            + clamp_unit(m.market_size) * 0.10
            + clamp_unit(m.competitive_index) * 0.05,
    )
}

/// Demand for labor and scarce skills push automation; slack labor holds it back
///
/// `0.4·laborDemand + 0.3·skillGap + 0.3·(1 - min(1, unemployment% / 20))`
pub fn labor_impact(l: &LaborStatistics) -> f64 {
    let slack = clamp_unit(l.unemployment_rate / 20.0);
    clamp_unit(
        0.4 * clamp_unit(l.labor_demand)
            + 0.3 * clamp_unit(l.skill_gap_index)
            + 0.3 * (1.0 - slack),
    )
}

/// `0.5·hub + 0.2·startups + 0.2·venture + 0.1·min(1, institutions / 50)`
pub fn tech_hub_impact(t: &TechHubData) -> f64 {
    clamp_unit(
        0.5 * clamp_unit(t.hub_score)
            + 0.2 * clamp_unit(t.startup_density)
            + 0.2 * clamp_unit(t.venture_capital)
            + 0.1 * clamp_unit(f64::from(t.research_institutions) / 50.0),
    )
}

/// Cost-of-living index relative to 200; the global average maps to 0.5
pub fn cost_impact(c: &CostOfLivingData) -> f64 {
    clamp_unit(c.index / 200.0)
}

/// Mean of the four impact figures
pub fn overall_impact(data: &RegionalMarketData) -> f64 {
    (market_impact(&data.market_indicators)
        + labor_impact(&data.labor_stats)
        + tech_hub_impact(&data.tech_hub)
        + cost_impact(&data.cost_of_living))
        / 4.0
}

fn region_metrics(region: &RegionalMarketData) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("market".to_string(), market_impact(&region.market_indicators)),
        ("labor".to_string(), labor_impact(&region.labor_stats)),
        ("techHub".to_string(), tech_hub_impact(&region.tech_hub)),
        ("costOfLiving".to_string(), cost_impact(&region.cost_of_living)),
        ("overall".to_string(), overall_impact(region)),
    ])
}

#[allow(clippy::too_many_arguments)]
fn profile(
    region_code: &str,
    name: &str,
    market: [f64; 6],
    unemployment_rate: f64,
    average_salary: f64,
    skill_gap_index: f64,
    labor_demand: f64,
    hub: [f64; 3],
    research_institutions: u32,
    tech_companies: u32,
    cost_index: f64,
) -> RegionalMarketData {
    RegionalMarketData {
        region_code: region_code.to_string(),
        name: name.to_string(),
        market_indicators: MarketIndicators {
            gdp_growth: market[0],
            employment_rate: market[1],
            industry_growth: market[2],
            innovation_index: market[3],
            market_size: market[4],
            competitive_index: market[5],
        },
        labor_stats: LaborStatistics {
            unemployment_rate,
            average_salary,
            skill_gap_index,
            workforce_size: 0.0,
            labor_demand,
            skill_availability: BTreeMap::new(),
        },
        tech_hub: TechHubData {
            hub_score: hub[0],
            startup_density: hub[1],
            venture_capital: hub[2],
            research_institutions,
            tech_companies,
        },
        cost_of_living: CostOfLivingData {
            index: cost_index,
            housing_cost: cost_index * 0.35,
            transportation_cost: cost_index * 0.15,
            utilities: cost_index * 0.08,
            average_rent: cost_index * 12.0,
        },
    }
}

fn build_profiles() -> Vec<RegionalMarketData> {
    vec![
        profile("NA", "North America", [2.5, 0.96, 0.60, 0.85, 0.95, 0.80], 3.8, 65_000.0, 0.55, 0.70, [0.85, 0.80, 0.90], 120, 5_000, 115.0),
        profile("WEU", "Western Europe", [1.5, 0.93, 0.50, 0.80, 0.85, 0.75], 6.5, 48_000.0, 0.50, 0.60, [0.68, 0.60, 0.65], 140, 3_500, 110.0),
        profile("APAC", "Asia Pacific", [4.5, 0.95, 0.75, 0.75, 0.90, 0.70], 4.0, 30_000.0, 0.65, 0.75, [0.72, 0.70, 0.70], 110, 4_200, 90.0),
        profile("EEU", "Eastern Europe", [3.2, 0.92, 0.55, 0.55, 0.50, 0.55], 5.5, 18_000.0, 0.58, 0.55, [0.50, 0.45, 0.35], 60, 900, 70.0),
        profile("LATAM", "Latin America", [2.0, 0.91, 0.45, 0.45, 0.55, 0.50], 8.5, 15_000.0, 0.62, 0.50, [0.40, 0.40, 0.30], 45, 700, 70.0),
        profile("AFR", "Africa", [3.5, 0.88, 0.50, 0.30, 0.40, 0.40], 12.0, 6_000.0, 0.70, 0.45, [0.30, 0.35, 0.20], 20, 300, 55.0),
    ]
}

fn default_profile() -> RegionalMarketData {
    profile(DEFAULT_REGION_CODE, "Global", [3.0, 0.93, 0.50, 0.50, 0.50, 0.50], 5.5, 25_000.0, 0.50, 0.50, [0.50, 0.50, 0.50], 25, 500, 100.0)
}
