//! O*NET Web Services client
//!
//! HTTP basic auth against `services.onetcenter.org`. Responses are decoded into
//! typed structs and converted to domain records at this boundary.
//!
//! O*NET publishes a current snapshot, not a time series: the historical series
//! is a single point derived from four resources (details, technology, skills,
//! tasks) fetched concurrently.

use apo_common::config::OnetConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::{OccupationSource, RateLimiter};
use crate::types::{
    clamp_score, DataPointFactors, DateRange, HistoricalDataPoint, HistoricalMetrics,
    OccupationCode, OccupationRecord, ResourceKind, SourceError, TechnologySkill,
};

const USER_AGENT: &str = concat!("onet-apo/", env!("CARGO_PKG_VERSION"));

/// Points in a live historical series
pub const SNAPSHOT_POINTS: usize = 1;

/// Score used when a resource has no usable values
const NEUTRAL_SCORE: f64 = 50.0;

const TASK_WEIGHT: f64 = 0.4;
const SKILL_WEIGHT: f64 = 0.3;
const TECHNOLOGY_WEIGHT: f64 = 0.3;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct OnetOccupation {
    code: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: OnetTags,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OnetTags {
    #[serde(default)]
    bright_outlook: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OnetTechnologyResponse {
    #[serde(default)]
    category: Vec<OnetTechnologyCategory>,
}

#[derive(Debug, Clone, Deserialize)]
struct OnetTechnologyCategory {
    title: OnetNamed,
    #[serde(default)]
    example: Vec<OnetTechnologyExample>,
}

#[derive(Debug, Clone, Deserialize)]
struct OnetNamed {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OnetTechnologyExample {
    name: String,
    #[serde(default)]
    hot_technology: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OnetSkillsResponse {
    #[serde(default)]
    element: Vec<OnetScoredItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OnetTasksResponse {
    #[serde(default)]
    task: Vec<OnetScoredItem>,
}

/// Skill element or task statement with its importance score (0-100)
#[derive(Debug, Clone, Deserialize)]
struct OnetScoredItem {
    #[serde(default)]
    score: Option<OnetScore>,
}

#[derive(Debug, Clone, Deserialize)]
struct OnetScore {
    value: f64,
}

/// The four O*NET resources behind one historical point
#[derive(Debug, Clone)]
struct OnetSnapshot {
    occupation: OnetOccupation,
    technology: OnetTechnologyResponse,
    skills: OnetSkillsResponse,
    tasks: OnetTasksResponse,
}

// ============================================================================
// Client
// ============================================================================

/// O*NET Web Services client
pub struct OnetClient {
    http_client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    rate_limiter: Arc<RateLimiter>,
}

impl OnetClient {
    /// Build a client from validated configuration
    ///
    /// # Errors
    /// Returns `Error::Config` when credentials are missing.
    pub fn new(config: &OnetConfig) -> apo_common::Result<Self> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(apo_common::Error::Config(
                "O*NET client requires username and password".to_string(),
            ));
        };

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| apo_common::Error::Internal(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: username.clone(),
            password: password.clone(),
            rate_limiter: Arc::new(RateLimiter::new(Duration::from_millis(
                config.min_request_interval_ms,
            ))),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        path: &str,
    ) -> Result<T, SourceError> {
        self.rate_limiter.wait("onet").await;

        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(url = %url, kind = %kind, "Querying O*NET");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::unavailable(kind, format!("network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status.as_u16() {
                401 | 403 => "authentication rejected".to_string(),
                404 => "occupation not found".to_string(),
                429 => "rate limited".to_string(),
                code => format!("HTTP {}", code),
            };
            return Err(SourceError::unavailable(kind, reason));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::unavailable(kind, format!("schema error: {}", e)))
    }

    async fn fetch_occupation(&self, code: &OccupationCode) -> Result<OnetOccupation, SourceError> {
        self.get_json(
            ResourceKind::OccupationDetails,
            &format!("online/occupations/{}", code),
        )
        .await
    }

    async fn fetch_technology(
        &self,
        code: &OccupationCode,
    ) -> Result<OnetTechnologyResponse, SourceError> {
        self.get_json(
            ResourceKind::TechnologySkills,
            &format!("online/occupations/{}/details/technology_skills", code),
        )
        .await
    }

    async fn fetch_snapshot(&self, code: &OccupationCode) -> Result<OnetSnapshot, SourceError> {
        let kind = ResourceKind::HistoricalSeries;
        let skills_path = format!("online/occupations/{}/details/skills", code);
        let tasks_path = format!("online/occupations/{}/details/tasks", code);
        let (occupation, technology, skills, tasks) = tokio::try_join!(
            self.fetch_occupation(code),
            self.fetch_technology(code),
            self.get_json::<OnetSkillsResponse>(kind, &skills_path),
            self.get_json::<OnetTasksResponse>(kind, &tasks_path),
        )?;

        Ok(OnetSnapshot {
            occupation,
            technology,
            skills,
            tasks,
        })
    }
}

#[async_trait]
impl OccupationSource for OnetClient {
    fn name(&self) -> &'static str {
        "onet"
    }

    async fn fetch_occupation_details(
        &self,
        code: &OccupationCode,
    ) -> Result<OccupationRecord, SourceError> {
        let occupation = self.fetch_occupation(code).await?;
        to_record(code, occupation)
    }

    async fn fetch_technology_skills(
        &self,
        code: &OccupationCode,
    ) -> Result<Vec<TechnologySkill>, SourceError> {
        let technology = self.fetch_technology(code).await?;
        Ok(to_technology_skills(technology))
    }

    async fn fetch_historical_series(
        &self,
        code: &OccupationCode,
        range: DateRange,
    ) -> Result<Vec<HistoricalDataPoint>, SourceError> {
        let snapshot = self.fetch_snapshot(code).await?;
        let point = snapshot_to_point(code, &snapshot, range.end());
        tracing::info!(
            code = %code,
            apo = point.metrics.apo,
            confidence = point.confidence,
            "O*NET snapshot converted"
        );
        Ok(vec![point])
    }
}

// ============================================================================
// Conversion
// ============================================================================

fn to_record(code: &OccupationCode, occupation: OnetOccupation) -> Result<OccupationRecord, SourceError> {
    if occupation.code != code.as_str() {
        return Err(SourceError::unavailable(
            ResourceKind::OccupationDetails,
            format!("response for {} while requesting {}", occupation.code, code),
        ));
    }
    Ok(OccupationRecord {
        code: code.clone(),
        title: occupation.title,
        description: occupation.description,
    })
}

fn to_technology_skills(response: OnetTechnologyResponse) -> Vec<TechnologySkill> {
    response
        .category
        .into_iter()
        .flat_map(|category| {
            let category_name = category.title.name;
            category.example.into_iter().map(move |example| TechnologySkill {
                name: example.name,
                category: category_name.clone(),
                hot_technology: example.hot_technology,
            })
        })
        .collect()
}

/// Mean importance; neutral when no item carries a score
fn mean_importance(items: &[OnetScoredItem]) -> f64 {
    let scores: Vec<f64> = items
        .iter()
        .filter_map(|item| item.score.as_ref().map(|s| s.value))
        .filter(|v| v.is_finite())
        .collect();
    if scores.is_empty() {
        NEUTRAL_SCORE
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Hot technologies count as 75, others as 50
fn technology_adoption(response: &OnetTechnologyResponse) -> f64 {
    let examples: Vec<&OnetTechnologyExample> =
        response.category.iter().flat_map(|c| c.example.iter()).collect();
    if examples.is_empty() {
        return NEUTRAL_SCORE;
    }
    let total: f64 = examples
        .iter()
        .map(|e| if e.hot_technology { 75.0 } else { NEUTRAL_SCORE })
        .sum();
    total / examples.len() as f64
}

/// Share of the four resources that carried data, floored at 0.5
fn completeness(snapshot: &OnetSnapshot) -> f64 {
    let present = [
        !snapshot.occupation.title.is_empty(),
        snapshot.technology.category.iter().any(|c| !c.example.is_empty()),
        !snapshot.skills.element.is_empty(),
        !snapshot.tasks.task.is_empty(),
    ]
    .iter()
    .filter(|p| **p)
    .count();

    (present as f64 / 4.0).max(0.5)
}

fn snapshot_to_point(
    code: &OccupationCode,
    snapshot: &OnetSnapshot,
    timestamp: DateTime<Utc>,
) -> HistoricalDataPoint {
    let task_automation = mean_importance(&snapshot.tasks.task);
    let skill_relevance = mean_importance(&snapshot.skills.element);
    let technology_adoption = technology_adoption(&snapshot.technology);
    let market_demand = if snapshot.occupation.tags.bright_outlook {
        70.0
    } else {
        NEUTRAL_SCORE
    };

    let apo = task_automation * TASK_WEIGHT
        + skill_relevance * SKILL_WEIGHT
        + technology_adoption * TECHNOLOGY_WEIGHT;

    HistoricalDataPoint {
        timestamp,
        occupation_code: code.clone(),
        metrics: HistoricalMetrics {
            apo: clamp_score(apo),
            task_automation,
            skill_relevance,
            technology_adoption,
            market_demand,
        },
        source: "onet".to_string(),
        confidence: completeness(snapshot),
        factors: DataPointFactors {
            technology_impact: technology_adoption,
            industry_adoption: NEUTRAL_SCORE,
            market_growth: market_demand,
        },
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> OccupationCode {
        OccupationCode::parse("15-1252.00").unwrap()
    }

    const OCCUPATION_JSON: &str = r#"{"code":"15-1252.00","title":"Software Developers","description":"Research, design, and develop software.","tags":{"bright_outlook":true,"green":false}}"#;
    const TECHNOLOGY_JSON: &str = r#"{"category":[{"title":{"name":"Development environment software"},"example":[{"name":"Git","hot_technology":true},{"name":"Eclipse IDE"}]}]}"#;
    const SKILLS_JSON: &str = r#"{"element":[{"id":"2.A.1.a","name":"Reading Comprehension","score":{"value":70}},{"id":"2.B.3.e","name":"Programming","score":{"value":90}}]}"#;
    const TASKS_JSON: &str = r#"{"task":[{"id":1,"statement":"Modify existing software.","score":{"value":60}}]}"#;

    fn snapshot() -> OnetSnapshot {
        OnetSnapshot {
            occupation: serde_json::from_str(OCCUPATION_JSON).unwrap(),
            technology: serde_json::from_str(TECHNOLOGY_JSON).unwrap(),
            skills: serde_json::from_str(SKILLS_JSON).unwrap(),
            tasks: serde_json::from_str(TASKS_JSON).unwrap(),
        }
    }

    fn config_for(base_url: String) -> OnetConfig {
        OnetConfig {
            base_url,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            timeout_secs: 2,
            min_request_interval_ms: 0,
        }
    }

    /// Local stand-in for O*NET Web Services serving the fixture documents
    async fn serve_fixtures() -> String {
        use axum::{routing::get, Router};

        let json = |body: &'static str| {
            move || async move { ([(axum::http::header::CONTENT_TYPE, "application/json")], body) }
        };
        let app = Router::new()
            .route("/online/occupations/:code", get(json(OCCUPATION_JSON)))
            .route(
                "/online/occupations/:code/details/technology_skills",
                get(json(TECHNOLOGY_JSON)),
            )
            .route("/online/occupations/:code/details/skills", get(json(SKILLS_JSON)))
            .route("/online/occupations/:code/details/tasks", get(json(TASKS_JSON)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_technology_skills_flattened() {
        let skills = to_technology_skills(snapshot().technology);
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].name, "Git");
        assert!(skills[0].hot_technology);
        assert_eq!(skills[1].category, "Development environment software");
        assert!(!skills[1].hot_technology);
    }

    #[test]
    fn test_snapshot_to_point_blend() {
        let now = Utc::now();
        let point = snapshot_to_point(&code(), &snapshot(), now);

        // tasks 60, skills 80, technology (75+50)/2
        assert!((point.metrics.task_automation - 60.0).abs() < 1e-9);
        assert!((point.metrics.skill_relevance - 80.0).abs() < 1e-9);
        assert!((point.metrics.technology_adoption - 62.5).abs() < 1e-9);
        let expected = 60.0 * 0.4 + 80.0 * 0.3 + 62.5 * 0.3;
        assert!((point.metrics.apo - expected).abs() < 1e-9);
        assert_eq!(point.metrics.market_demand, 70.0);
        assert_eq!(point.confidence, 1.0);
        assert_eq!(point.timestamp, now);
    }

    #[test]
    fn test_empty_resources_default_to_neutral() {
        let mut snap = snapshot();
        snap.technology = OnetTechnologyResponse::default();
        snap.skills = OnetSkillsResponse::default();
        snap.tasks = OnetTasksResponse::default();

        let point = snapshot_to_point(&code(), &snap, Utc::now());
        assert_eq!(point.metrics.apo, 50.0);
        // Only details present: 1/4 floored to 0.5
        assert_eq!(point.confidence, 0.5);
    }

    #[test]
    fn test_record_code_mismatch_is_schema_failure() {
        let occupation = snapshot().occupation;
        let other = OccupationCode::parse("43-4051.00").unwrap();
        assert!(matches!(
            to_record(&other, occupation),
            Err(SourceError::Unavailable { kind: ResourceKind::OccupationDetails, .. })
        ));
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(OnetClient::new(&OnetConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let client = OnetClient::new(&config_for("http://127.0.0.1:9".to_string())).unwrap();

        let result = client.fetch_occupation_details(&code()).await;
        assert!(matches!(
            result,
            Err(SourceError::Unavailable { kind: ResourceKind::OccupationDetails, .. })
        ));
    }

    #[tokio::test]
    async fn test_historical_series_is_one_blended_snapshot() {
        let client = OnetClient::new(&config_for(serve_fixtures().await)).unwrap();
        let range = DateRange::months_ending(Utc::now(), 12);

        let series = client.fetch_historical_series(&code(), range).await.unwrap();
        assert_eq!(series.len(), SNAPSHOT_POINTS);
        let expected = snapshot_to_point(&code(), &snapshot(), range.end());
        assert_eq!(series[0].metrics, expected.metrics);
        assert_eq!(series[0].timestamp, range.end());

        let details = client.fetch_occupation_details(&code()).await.unwrap();
        assert_eq!(details.title, "Software Developers");
    }
}
