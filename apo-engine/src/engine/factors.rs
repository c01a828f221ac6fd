//! Automation factor sets and APO factor breakdown

use crate::types::{
    clamp_score, clamp_unit, AutomationFactor, FactorBreakdown, OccupationCode, RegionalFactors,
};

/// Base share of each breakdown dimension
///
/// Task complexity 25%, collaboration 20%, industry adoption 25%,
/// emerging technology 20%, regional 10%.
const BASE_WEIGHTS: [f64; 5] = [0.25, 0.20, 0.25, 0.20, 0.10];

/// Regional contribution by income tier
const HIGH_INCOME_TIER: f64 = 1.0;
const MIDDLE_INCOME_TIER: f64 = 0.8;
const LOW_INCOME_TIER: f64 = 0.6;

/// APO used when a factor set carries no weight
const NEUTRAL_APO: f64 = 50.0;

/// Factor template: (id, name, category, complexity, repetitiveness, collaboration, emerging tech)
const FACTOR_TEMPLATES: [(&str, &str, &str, f64, f64, f64, f64); 5] = [
    ("routine-tasks", "Routine Task Execution", "task", 2.0, 0.9, 0.3, 0.7),
    ("cognitive-analysis", "Cognitive Analysis", "cognitive", 4.0, 0.4, 0.6, 0.8),
    ("social-interaction", "Social Interaction", "interpersonal", 4.0, 0.2, 0.8, 0.3),
    ("physical-dexterity", "Physical Dexterity", "physical", 3.0, 0.6, 0.4, 0.5),
    ("technology-integration", "Technology Integration", "technology", 3.0, 0.5, 0.7, 0.9),
];

/// Factor weights per SOC major group, in template order
fn group_weights(major_group: &str) -> [f64; 5] {
    match major_group {
        "15" => [0.5, 0.8, 0.4, 0.1, 0.9],
        "43" => [0.9, 0.4, 0.5, 0.2, 0.7],
        "41" => [0.6, 0.4, 0.8, 0.2, 0.5],
        "47" | "49" | "51" | "53" => [0.7, 0.3, 0.3, 0.9, 0.5],
        "29" | "31" => [0.4, 0.7, 0.9, 0.6, 0.5],
        "21" | "25" | "39" => [0.3, 0.6, 0.9, 0.2, 0.4],
        "35" | "37" => [0.8, 0.2, 0.5, 0.8, 0.3],
        "11" | "13" | "23" => [0.4, 0.8, 0.7, 0.1, 0.6],
        _ => [0.6, 0.5, 0.5, 0.5, 0.5],
    }
}

/// Default factor set for an occupation, seeded by its major group
pub fn seed_factors(code: &OccupationCode) -> Vec<AutomationFactor> {
    let weights = group_weights(code.major_group());
    FACTOR_TEMPLATES
        .iter()
        .zip(weights)
        .map(
            |(&(id, name, category, complexity, repetitiveness, collaboration, emerging), weight)| {
                AutomationFactor {
                    id: id.to_string(),
                    name: name.to_string(),
                    category: category.to_string(),
                    weight,
                    complexity,
                    repetitiveness,
                    human_ai_collaboration: collaboration,
                    emerging_tech_impact: emerging,
                    industry_specific: false,
                }
            },
        )
        .collect()
}

/// Aggregate 0-1 signals of a factor set, weighted by factor weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorSignals {
    /// Low complexity and high repetitiveness
    pub task_automatability: f64,
    pub collaboration: f64,
    pub emerging_tech: f64,
}

impl FactorSignals {
    pub const NEUTRAL: FactorSignals = FactorSignals {
        task_automatability: 0.5,
        collaboration: 0.5,
        emerging_tech: 0.5,
    };

    pub fn from_factors(factors: &[AutomationFactor]) -> Self {
        let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
        if total_weight <= 0.0 || !total_weight.is_finite() {
            return Self::NEUTRAL;
        }

        let weighted = |value: fn(&AutomationFactor) -> f64| {
            clamp_unit(factors.iter().map(|f| f.weight * value(f)).sum::<f64>() / total_weight)
        };

        Self {
            task_automatability: weighted(task_automatability),
            collaboration: weighted(|f| f.human_ai_collaboration),
            emerging_tech: weighted(|f| f.emerging_tech_impact),
        }
    }
}

/// Automation signal of one factor: mean of simplicity and repetitiveness
fn task_automatability(factor: &AutomationFactor) -> f64 {
    let simplicity = (5.0 - factor.complexity) / 4.0;
    (simplicity + factor.repetitiveness) / 2.0
}

/// APO from factor weights alone (0-100)
///
/// Used by the static fallback path. Each factor contributes the mean of its
/// task automatability and emerging-technology impact.
pub fn static_apo(factors: &[AutomationFactor]) -> f64 {
    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    if total_weight <= 0.0 || !total_weight.is_finite() {
        return NEUTRAL_APO;
    }
    let weighted: f64 = factors
        .iter()
        .map(|f| f.weight * (task_automatability(f) + f.emerging_tech_impact) / 2.0)
        .sum();
    clamp_score(weighted / total_weight * 100.0)
}

/// Split a 0-100 APO score across the breakdown dimensions
///
/// Each base weight is scaled by `0.5 + signal` and the shares are normalized,
/// so task + collaboration + industry + emerging + high-income regional equals
/// `apo`.
pub fn factor_breakdown(
    apo: f64,
    signals: FactorSignals,
    industry_adoption: f64,
    regional_impact: f64,
) -> FactorBreakdown {
    let apo = clamp_score(apo);
    let raw = [
        BASE_WEIGHTS[0] * (0.5 + signals.task_automatability),
        BASE_WEIGHTS[1] * (0.5 + signals.collaboration),
        BASE_WEIGHTS[2] * (0.5 + clamp_unit(industry_adoption)),
        BASE_WEIGHTS[3] * (0.5 + signals.emerging_tech),
        BASE_WEIGHTS[4] * (0.5 + clamp_unit(regional_impact)),
    ];
    let total: f64 = raw.iter().sum();
    let share = |i: usize| clamp_score(apo * raw[i] / total);

    let regional = share(4);
    FactorBreakdown {
        task_complexity: share(0),
        collaboration_requirements: share(1),
        industry_adoption: share(2),
        emerging_tech_impact: share(3),
        regional_factors: RegionalFactors {
            high_income: regional * HIGH_INCOME_TIER,
            middle_income: regional * MIDDLE_INCOME_TIER,
            low_income: regional * LOW_INCOME_TIER,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> OccupationCode {
        OccupationCode::parse(s).unwrap()
    }

    #[test]
    fn test_seed_factors_by_major_group() {
        let office = seed_factors(&code("43-4051.00"));
        let computer = seed_factors(&code("15-1252.00"));
        assert_eq!(office.len(), 5);
        assert_eq!(office[0].id, "routine-tasks");
        assert!(office[0].weight > computer[0].weight);
        assert!(seed_factors(&code("99-9999.00")).iter().all(|f| f.weight > 0.0));
    }

    #[test]
    fn test_signals_neutral_for_empty_set() {
        assert_eq!(FactorSignals::from_factors(&[]), FactorSignals::NEUTRAL);
        assert_eq!(static_apo(&[]), NEUTRAL_APO);
    }

    #[test]
    fn test_breakdown_sums_to_apo() {
        let factors = seed_factors(&code("43-4051.00"));
        let signals = FactorSignals::from_factors(&factors);
        let breakdown = factor_breakdown(64.0, signals, 0.55, 0.6);

        let sum = breakdown.task_complexity
            + breakdown.collaboration_requirements
            + breakdown.industry_adoption
            + breakdown.emerging_tech_impact
            + breakdown.regional_factors.high_income;
        assert!((sum - 64.0).abs() < 1e-9);

        let r = breakdown.regional_factors;
        assert!((r.middle_income - r.high_income * 0.8).abs() < 1e-9);
        assert!((r.low_income - r.high_income * 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_breakdown_follows_base_weights() {
        let breakdown = factor_breakdown(100.0, FactorSignals::NEUTRAL, 0.5, 0.5);
        assert!((breakdown.task_complexity - 25.0).abs() < 1e-9);
        assert!((breakdown.collaboration_requirements - 20.0).abs() < 1e-9);
        assert!((breakdown.regional_factors.high_income - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_static_apo_bounded() {
        let mut factors = seed_factors(&code("51-2092.00"));
        let apo = static_apo(&factors);
        assert!((0.0..=100.0).contains(&apo));

        factors.iter_mut().for_each(|f| f.weight = 0.0);
        assert_eq!(static_apo(&factors), NEUTRAL_APO);
    }
}
