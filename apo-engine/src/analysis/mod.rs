//! Pure analysis modules feeding the APO engine
//!
//! Each module is a deterministic function of its inputs:
//! - `trend` - OLS trend over historical APO, forecast and confidence
//! - `correlation` - Pearson correlation of APO against per-point drivers
//! - `time_based` - industry/region/occupation growth over elapsed time
//! - `adoption` - technology adoption impact and insights (0-1 scale)
//! - `regional` - regional market impact and insights (0-1 scale)

pub mod adoption;
pub mod correlation;
pub mod regional;
pub mod time_based;
pub mod trend;

/// Arithmetic mean; 0 for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub use adoption::{AdoptionAnalyzer, AdoptionInsight, TechnologyAdoption};
pub use correlation::{CorrelationAnalyzer, CorrelationResult};
pub use regional::{RegionalAnalyzer, RegionalInsight, RegionalMarketData};
pub use time_based::TimeBasedAdjuster;
pub use trend::{TrendAnalyzer, TrendPrediction};
