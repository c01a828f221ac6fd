//! Deterministic synthetic data
//!
//! Every dataset is a pure function of a seed derived (SHA-256) from the request
//! parameters, so the same request always yields the same data. Used whenever a
//! live source is disabled, unconfigured or failing.

use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::analysis::time_based::occupation_label_for;
use crate::sources::{OccupationSource, ResearchSource};
use crate::types::{
    DataPointFactors, DateRange, HistoricalDataPoint, HistoricalMetrics, OccupationCode,
    OccupationRecord, ResearchSnippet, SourceError, TechnologySkill,
};

/// Longest synthetic series, in monthly points
pub const MAX_MOCK_POINTS: u32 = 36;

/// Source tag carried by synthetic records
pub const MOCK_SOURCE_TAG: &str = "synthetic";

const TECHNOLOGY_POOL: &[(&str, &str)] = &[
    ("Microsoft Excel", "Spreadsheet software"),
    ("Python", "Object or component oriented development software"),
    ("SAP", "Enterprise resource planning ERP software"),
    ("Salesforce", "Customer relationship management CRM software"),
    ("Tableau", "Business intelligence and data analysis software"),
    ("AutoCAD", "Computer aided design CAD software"),
    ("SQL", "Database management system software"),
    ("Epic Systems", "Medical software"),
    ("Microsoft Teams", "Electronic mail software"),
    ("UiPath", "Robotic process automation software"),
    ("Git", "Configuration management software"),
    ("QuickBooks", "Accounting software"),
];

const RESEARCH_OUTLETS: &[&str] = &[
    "McKinsey Global Institute",
    "OECD Employment Outlook",
    "World Economic Forum",
    "Brookings Institution",
    "MIT Work of the Future",
];

/// Seeded generator of occupation-shaped data
#[derive(Debug, Clone, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Stable seed for a list of request parameters
    pub fn seed(parts: &[&str]) -> u64 {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(b"|");
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    fn rng(parts: &[&str]) -> StdRng {
        StdRng::seed_from_u64(Self::seed(parts))
    }

    pub fn occupation_details(&self, code: &OccupationCode) -> OccupationRecord {
        let label = occupation_label_for(code);
        OccupationRecord {
            code: code.clone(),
            title: format!("{} Specialist", label),
            description: format!(
                "Synthetic profile for occupation {} in the {} group",
                code, label
            ),
        }
    }

    pub fn technology_skills(&self, code: &OccupationCode) -> Vec<TechnologySkill> {
        let mut rng = Self::rng(&["technology", code.as_str()]);
        let count = rng.gen_range(4..=8);
        TECHNOLOGY_POOL
            .choose_multiple(&mut rng, count)
            .map(|(name, category)| TechnologySkill {
                name: name.to_string(),
                category: category.to_string(),
                hot_technology: rng.gen_bool(0.4),
            })
            .collect()
    }

    /// Monthly series ending at `range.end()`
    ///
    /// APO follows `45 + 10·sin(i/2) + U[0,5)`.
    pub fn historical_series(
        &self,
        code: &OccupationCode,
        range: DateRange,
    ) -> Vec<HistoricalDataPoint> {
        let start = range.start().date_naive().to_string();
        let end = range.end().date_naive().to_string();
        let mut rng = Self::rng(&["history", code.as_str(), &start, &end]);

        let count = range.month_count().min(MAX_MOCK_POINTS);
        (0..count)
            .map(|i| {
                let x = f64::from(i);
                let apo = 45.0 + 10.0 * (x / 2.0).sin() + rng.gen_range(0.0..5.0);
                let months_back = i64::from(count - 1 - i);
                HistoricalDataPoint {
                    timestamp: range.end() - Duration::days(30 * months_back),
                    occupation_code: code.clone(),
                    metrics: HistoricalMetrics {
                        apo,
                        task_automation: apo + rng.gen_range(-5.0..5.0),
                        skill_relevance: 60.0 + rng.gen_range(-10.0..10.0),
                        technology_adoption: 40.0 + x + rng.gen_range(0.0..5.0),
                        market_demand: 50.0 + rng.gen_range(-10.0..10.0),
                    },
                    source: MOCK_SOURCE_TAG.to_string(),
                    confidence: rng.gen_range(0.6..0.9),
                    factors: DataPointFactors {
                        technology_impact: 50.0 + rng.gen_range(-15.0..15.0),
                        industry_adoption: 45.0 + x + rng.gen_range(0.0..5.0),
                        market_growth: 50.0 + rng.gen_range(-10.0..10.0),
                    },
                }
                .normalized()
            })
            .collect()
    }

    pub fn research_snippets(&self, query: &str) -> Vec<ResearchSnippet> {
        let mut rng = Self::rng(&["research", query]);
        let current_year = Utc::now().year();
        let count = rng.gen_range(3..=5);

        (0..count)
            .map(|_| {
                let outlet = RESEARCH_OUTLETS.choose(&mut rng).copied().unwrap_or("Research");
                let percentage: f64 = rng.gen_range(20.0..70.0);
                ResearchSnippet {
                    title: format!("Automation outlook: {}", query),
                    source: outlet.to_string(),
                    snippet: format!(
                        "An estimated {:.0}% of current work activities for {} could be automated with existing technology.",
                        percentage, query
                    ),
                    year: Some(current_year - rng.gen_range(0..4)),
                    automation_percentage: Some(percentage),
                    relevance: rng.gen_range(0.5..1.0),
                }
            })
            .collect()
    }
}

/// [`OccupationSource`] and [`ResearchSource`] over [`MockGenerator`]
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    generator: MockGenerator,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OccupationSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_occupation_details(
        &self,
        code: &OccupationCode,
    ) -> Result<OccupationRecord, SourceError> {
        Ok(self.generator.occupation_details(code))
    }

    async fn fetch_technology_skills(
        &self,
        code: &OccupationCode,
    ) -> Result<Vec<TechnologySkill>, SourceError> {
        Ok(self.generator.technology_skills(code))
    }

    async fn fetch_historical_series(
        &self,
        code: &OccupationCode,
        range: DateRange,
    ) -> Result<Vec<HistoricalDataPoint>, SourceError> {
        Ok(self.generator.historical_series(code, range))
    }
}

#[async_trait]
impl ResearchSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_research_snippets(
        &self,
        query: &str,
    ) -> Result<Vec<ResearchSnippet>, SourceError> {
        Ok(self.generator.research_snippets(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> OccupationCode {
        OccupationCode::parse("43-4051.00").unwrap()
    }

    #[test]
    fn test_same_seed_same_output() {
        let generator = MockGenerator::new();
        let range = DateRange::months_ending(Utc::now(), 12);

        assert_eq!(
            generator.historical_series(&code(), range),
            generator.historical_series(&code(), range)
        );
        assert_eq!(generator.technology_skills(&code()), generator.technology_skills(&code()));
        assert_eq!(
            generator.research_snippets("Customer Service Representatives"),
            generator.research_snippets("Customer Service Representatives")
        );
    }

    #[test]
    fn test_different_codes_differ() {
        let generator = MockGenerator::new();
        let other = OccupationCode::parse("15-1252.00").unwrap();
        assert_ne!(MockGenerator::seed(&["history", "43-4051.00"]), MockGenerator::seed(&["history", "15-1252.00"]));
        assert_ne!(generator.occupation_details(&code()), generator.occupation_details(&other));
    }

    #[test]
    fn test_series_shape() {
        let generator = MockGenerator::new();
        let end = Utc::now();
        let series = generator.historical_series(&code(), DateRange::months_ending(end, 12));

        assert_eq!(series.len(), 12);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(series.last().map(|p| p.timestamp), Some(end));
        for (i, point) in series.iter().enumerate() {
            let base = 45.0 + 10.0 * (i as f64 / 2.0).sin();
            assert!(point.metrics.apo >= base && point.metrics.apo < base + 5.0);
            assert!((0.0..=1.0).contains(&point.confidence));
            assert_eq!(point.source, MOCK_SOURCE_TAG);
        }
    }

    #[test]
    fn test_series_is_capped() {
        let generator = MockGenerator::new();
        let series = generator.historical_series(&code(), DateRange::months_ending(Utc::now(), 120));
        assert_eq!(series.len(), MAX_MOCK_POINTS as usize);
    }

    #[test]
    fn test_research_snippets_quote_percentages() {
        let snippets = MockGenerator::new().research_snippets("Cashiers");
        assert!((3..=5).contains(&snippets.len()));
        for snippet in snippets {
            let pct = snippet.automation_percentage.unwrap();
            assert!((20.0..70.0).contains(&pct));
            assert!((0.5..1.0).contains(&snippet.relevance));
        }
    }

    #[tokio::test]
    async fn test_mock_source_never_fails() {
        let source = MockSource::new();
        assert!(source.fetch_occupation_details(&code()).await.is_ok());
        assert!(source.fetch_technology_skills(&code()).await.is_ok());
        assert!(source.fetch_research_snippets("anything").await.is_ok());
    }
}
