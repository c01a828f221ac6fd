//! Data source adapters
//!
//! Every source speaks typed records or [`SourceError`]; partial data is never
//! returned. Adapters do not retry: recovery is the engine's mock fallback.

pub mod mock;
pub mod onet_client;
pub mod serp_client;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::types::{
    DateRange, HistoricalDataPoint, OccupationCode, OccupationRecord, ResearchSnippet,
    SourceError, TechnologySkill,
};

pub use mock::{MockGenerator, MockSource};
pub use onet_client::OnetClient;
pub use serp_client::SerpClient;

/// Occupation data (details, technologies, history)
#[async_trait]
pub trait OccupationSource: Send + Sync {
    /// Short source name for logs and provenance
    fn name(&self) -> &'static str;

    async fn fetch_occupation_details(
        &self,
        code: &OccupationCode,
    ) -> Result<OccupationRecord, SourceError>;

    async fn fetch_technology_skills(
        &self,
        code: &OccupationCode,
    ) -> Result<Vec<TechnologySkill>, SourceError>;

    /// Observations inside `range`, any order; the engine sorts and clamps
    async fn fetch_historical_series(
        &self,
        code: &OccupationCode,
        range: DateRange,
    ) -> Result<Vec<HistoricalDataPoint>, SourceError>;
}

/// Research and search-result snippets
#[async_trait]
pub trait ResearchSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_research_snippets(&self, query: &str)
        -> Result<Vec<ResearchSnippet>, SourceError>;
}

/// Minimum spacing between requests of one client
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub(crate) async fn wait(&self, source: &'static str) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!(source, "Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let start = Instant::now();
        limiter.wait("test").await;
        limiter.wait("test").await;
        limiter.wait("test").await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
