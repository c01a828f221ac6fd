//! Time-based APO adjustment
//!
//! Combines three growth-rate tables (industry, region, occupation), each scaled
//! by the elapsed time up to its own cap so long horizons do not extrapolate
//! without bound.
//!
//! ```text
//! growth   = 0.4·industry·min(t,10) + 0.3·region·min(t,8) + 0.3·occupation·min(t,12)
//! growth   = clamp(growth, 0, 1)
//! adjusted = clamp(base·(1 + growth), 0, 100)
//! ```
//!
//! Scores are on the 0-100 scale. Labels missing from a table use
//! [`BASE_GROWTH_RATE`].

use std::collections::{BTreeMap, HashMap};

use crate::types::{clamp_score, clamp_unit, OccupationCode};

/// Annual growth rate for labels absent from a table
pub const BASE_GROWTH_RATE: f64 = 0.05;

const INDUSTRY_WEIGHT: f64 = 0.4;
const REGION_WEIGHT: f64 = 0.3;
const OCCUPATION_WEIGHT: f64 = 0.3;

const INDUSTRY_CAP_YEARS: f64 = 10.0;
const REGION_CAP_YEARS: f64 = 8.0;
const OCCUPATION_CAP_YEARS: f64 = 12.0;

/// Longest horizon at which any table still changes the result
pub const MAX_EFFECTIVE_YEARS: f64 = OCCUPATION_CAP_YEARS;

/// O*NET-SOC major groups and their occupation-table labels
const MAJOR_GROUPS: &[(&str, &str)] = &[
    ("11", "Management"),
    ("13", "Business and Financial Operations"),
    ("15", "Computer and Mathematical"),
    ("17", "Architecture and Engineering"),
    ("19", "Life, Physical, and Social Science"),
    ("21", "Community and Social Service"),
    ("23", "Legal"),
    ("25", "Educational Instruction and Library"),
    ("27", "Arts, Design, Entertainment, Sports, and Media"),
    ("29", "Healthcare Practitioners and Technical"),
    ("31", "Healthcare Support"),
    ("33", "Protective Service"),
    ("35", "Food Preparation and Serving Related"),
    ("37", "Building and Grounds Cleaning and Maintenance"),
    ("39", "Personal Care and Service"),
    ("41", "Sales and Related"),
    ("43", "Office and Administrative Support"),
    ("45", "Farming, Fishing, and Forestry"),
    ("47", "Construction and Extraction"),
    ("49", "Installation, Maintenance, and Repair"),
    ("51", "Production"),
    ("53", "Transportation and Material Moving"),
    ("55", "Military Specific"),
];

/// Label used for codes outside the known major groups
pub const GENERAL_OCCUPATION_LABEL: &str = "General";

/// Occupation-table label for an O*NET code's major group
pub fn occupation_label_for(code: &OccupationCode) -> &'static str {
    MAJOR_GROUPS
        .iter()
        .find(|(group, _)| *group == code.major_group())
        .map(|(_, label)| *label)
        .unwrap_or(GENERAL_OCCUPATION_LABEL)
}

/// Time-based adjustment tables
///
/// Lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct TimeBasedAdjuster {
    base_rate: f64,
    industry_rates: HashMap<String, f64>,
    regional_rates: HashMap<String, f64>,
    occupation_rates: HashMap<String, f64>,
    skill_obsolescence_rates: HashMap<String, f64>,
}

impl Default for TimeBasedAdjuster {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeBasedAdjuster {
    /// Create adjuster with the default growth tables
    pub fn new() -> Self {
        Self {
            base_rate: BASE_GROWTH_RATE,
            industry_rates: table(&[
                ("Technology", 0.08),
                ("Healthcare", 0.06),
                ("Finance", 0.07),
                ("Manufacturing", 0.06),
                ("Retail", 0.05),
                ("Education", 0.04),
                ("Construction", 0.04),
                ("Agriculture", 0.05),
            ]),
            regional_rates: table(&[
                ("North America", 0.07),
                ("Western Europe", 0.06),
                ("Asia Pacific", 0.08),
                ("Eastern Europe", 0.05),
                ("Latin America", 0.04),
                ("Middle East", 0.05),
                ("Africa", 0.03),
                ("South Asia", 0.06),
                ("Southeast Asia", 0.07),
                ("Oceania", 0.05),
            ]),
            occupation_rates: table(&[
                ("Management", 0.04),
                ("Business and Financial Operations", 0.06),
                ("Computer and Mathematical", 0.07),
                ("Architecture and Engineering", 0.05),
                ("Life, Physical, and Social Science", 0.05),
                ("Community and Social Service", 0.03),
                ("Legal", 0.05),
                ("Educational Instruction and Library", 0.03),
                ("Arts, Design, Entertainment, Sports, and Media", 0.05),
                ("Healthcare Practitioners and Technical", 0.04),
                ("Healthcare Support", 0.05),
                ("Protective Service", 0.04),
                ("Food Preparation and Serving Related", 0.07),
                ("Building and Grounds Cleaning and Maintenance", 0.04),
                ("Personal Care and Service", 0.03),
                ("Sales and Related", 0.06),
                ("Office and Administrative Support", 0.09),
                ("Farming, Fishing, and Forestry", 0.06),
                ("Construction and Extraction", 0.04),
                ("Installation, Maintenance, and Repair", 0.05),
                ("Production", 0.08),
                ("Transportation and Material Moving", 0.08),
                ("Military Specific", 0.04),
            ]),
            skill_obsolescence_rates: table(&[
                ("Technical Skills", 0.15),
                ("Soft Skills", 0.05),
                ("Domain Knowledge", 0.10),
                ("Digital Literacy", 0.12),
                ("Data Analysis", 0.14),
                ("Problem Solving", 0.06),
                ("Communication", 0.04),
                ("Leadership", 0.03),
            ]),
        }
    }

    pub fn industry_rate(&self, industry: Option<&str>) -> f64 {
        self.lookup(&self.industry_rates, industry)
    }

    pub fn regional_rate(&self, region: Option<&str>) -> f64 {
        self.lookup(&self.regional_rates, region)
    }

    pub fn occupation_rate(&self, occupation: Option<&str>) -> f64 {
        self.lookup(&self.occupation_rates, occupation)
    }

    pub fn skill_obsolescence_rate(&self, skill: &str) -> f64 {
        self.lookup(&self.skill_obsolescence_rates, Some(skill))
    }

    /// Whether the industry table has its own rate for `industry`
    pub fn knows_industry(&self, industry: &str) -> bool {
        self.industry_rates.contains_key(&industry.trim().to_lowercase())
    }

    /// Whether the regional table has its own rate for `region`
    pub fn knows_region(&self, region: &str) -> bool {
        self.regional_rates.contains_key(&region.trim().to_lowercase())
    }

    fn lookup(&self, table: &HashMap<String, f64>, label: Option<&str>) -> f64 {
        label
            .and_then(|l| table.get(&l.trim().to_lowercase()))
            .copied()
            .unwrap_or(self.base_rate)
    }

    /// Growth increment (0.0-1.0) after `timeframe_years`
    pub fn growth(
        &self,
        timeframe_years: f64,
        industry: Option<&str>,
        region: Option<&str>,
        occupation: Option<&str>,
    ) -> f64 {
        let t = if timeframe_years.is_finite() {
            timeframe_years.max(0.0)
        } else {
            0.0
        };

        let growth = INDUSTRY_WEIGHT * self.industry_rate(industry) * t.min(INDUSTRY_CAP_YEARS)
            + REGION_WEIGHT * self.regional_rate(region) * t.min(REGION_CAP_YEARS)
            + OCCUPATION_WEIGHT * self.occupation_rate(occupation) * t.min(OCCUPATION_CAP_YEARS);

        clamp_unit(growth)
    }

    /// Adjust a 0-100 score for elapsed time
    pub fn adjust(
        &self,
        base_score: f64,
        timeframe_years: f64,
        industry: Option<&str>,
        region: Option<&str>,
        occupation: Option<&str>,
    ) -> f64 {
        let growth = self.growth(timeframe_years, industry, region, occupation);
        clamp_score(clamp_score(base_score) * (1.0 + growth))
    }

    /// Cumulative obsolescence per skill, one entry per year: `1 - (1 - rate)^(year+1)`
    pub fn obsolescence(&self, skills: &[String], years: u32) -> BTreeMap<String, Vec<f64>> {
        skills
            .iter()
            .map(|skill| {
                let rate = self.skill_obsolescence_rate(skill);
                let timeline = (0..years)
                    .map(|year| 1.0 - (1.0 - rate).powi(year as i32 + 1))
                    .collect();
                (skill.clone(), timeline)
            })
            .collect()
    }

    /// Compound automation growth multiplier per year for an industry
    pub fn industry_timeline(&self, industry: Option<&str>, years: u32) -> Vec<f64> {
        compound_timeline(self.industry_rate(industry), years)
    }

    /// Compound automation growth multiplier per year for a region
    pub fn regional_timeline(&self, region: Option<&str>, years: u32) -> Vec<f64> {
        compound_timeline(self.regional_rate(region), years)
    }
}

fn table(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries
        .iter()
        .map(|(label, rate)| (label.to_lowercase(), *rate))
        .collect()
}

fn compound_timeline(rate: f64, years: u32) -> Vec<f64> {
    (0..years).map(|year| (1.0 + rate).powi(year as i32 + 1)).collect()
}
