//! Search engine results (SerpApi) client
//!
//! Organic results are mapped to [`ResearchSnippet`]s; automation percentages
//! and publication years are extracted from the result text.

use apo_common::config::SerpConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::sources::ResearchSource;
use crate::types::{ResearchSnippet, ResourceKind, SourceError};

const USER_AGENT: &str = concat!("onet-apo/", env!("CARGO_PKG_VERSION"));
const RESULTS_PER_QUERY: &str = "10";

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpOrganicResult {
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// SerpApi client
pub struct SerpClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SerpClient {
    /// # Errors
    /// Returns `Error::Config` when the API key is missing.
    pub fn new(config: &SerpConfig) -> apo_common::Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            return Err(apo_common::Error::Config(
                "SERP client requires an API key".to_string(),
            ));
        };

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| apo_common::Error::Internal(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ResearchSource for SerpClient {
    fn name(&self) -> &'static str {
        "serp"
    }

    async fn fetch_research_snippets(
        &self,
        query: &str,
    ) -> Result<Vec<ResearchSnippet>, SourceError> {
        let kind = ResourceKind::ResearchSnippets;
        tracing::debug!(query = %query, "Querying SERP API");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", RESULTS_PER_QUERY),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::unavailable(kind, format!("network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status.as_u16() {
                401 | 403 => "API key rejected".to_string(),
                429 => "rate limited".to_string(),
                code => format!("HTTP {}", code),
            };
            return Err(SourceError::unavailable(kind, reason));
        }

        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(kind, format!("schema error: {}", e)))?;

        if let Some(error) = body.error {
            return Err(SourceError::unavailable(kind, error));
        }

        let snippets = to_snippets(body.organic_results);
        tracing::info!(query = %query, results = snippets.len(), "SERP results received");
        Ok(snippets)
    }
}

fn to_snippets(results: Vec<SerpOrganicResult>) -> Vec<ResearchSnippet> {
    results
        .into_iter()
        .enumerate()
        .map(|(position, result)| {
            let text = format!("{} {}", result.title, result.snippet);
            let year = result
                .date
                .as_deref()
                .and_then(extract_year)
                .or_else(|| extract_year(&text));
            ResearchSnippet {
                automation_percentage: extract_automation_percentage(&text),
                year,
                relevance: (1.0 - 0.1 * position as f64).max(0.3),
                source: result
                    .source
                    .unwrap_or_else(|| host_of(&result.link).to_string()),
                title: result.title,
                snippet: result.snippet,
            }
        })
        .collect()
}

/// First percentage in text that mentions automation, within 0-100
///
/// Accepts "45%", "45 percent" and "12.5 %".
pub fn extract_automation_percentage(text: &str) -> Option<f64> {
    if !text.to_lowercase().contains("automat") {
        return None;
    }
    numeric_tokens(text)
        .into_iter()
        .filter(|(_, rest)| starts_with_percent(rest))
        .filter_map(|(token, _)| {
            let integer_digits = token.split('.').next().map_or(0, str::len);
            if integer_digits > 3 {
                return None;
            }
            token.parse::<f64>().ok()
        })
        .find(|v| (0.0..=100.0).contains(v))
}

/// First standalone 19xx/20xx year
pub fn extract_year(text: &str) -> Option<i32> {
    numeric_tokens(text)
        .into_iter()
        .find(|(token, rest)| {
            token.len() == 4
                && (token.starts_with("19") || token.starts_with("20"))
                && token.bytes().all(|b| b.is_ascii_digit())
                && !rest.starts_with(|c: char| c.is_alphanumeric())
        })
        .and_then(|(token, _)| token.parse().ok())
}

/// Numbers that start on a word boundary, each paired with the text after it
fn numeric_tokens(text: &str) -> Vec<(&str, &str)> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut prev: Option<char> = None;

    while let Some((start, c)) = chars.next() {
        let at_boundary = !prev.is_some_and(|p| p.is_alphanumeric() || p == '.');
        if !(c.is_ascii_digit() && at_boundary) {
            prev = Some(c);
            continue;
        }

        let mut end = start + 1;
        while let Some(&(i, d)) = chars.peek() {
            if !(d.is_ascii_digit() || d == '.') {
                break;
            }
            end = i + 1;
            chars.next();
        }
        let token = text[start..end].trim_end_matches('.');
        tokens.push((token, &text[start + token.len()..]));
        prev = text[start..end].chars().next_back();
    }
    tokens
}

fn starts_with_percent(rest: &str) -> bool {
    let rest = rest.trim_start();
    if rest.starts_with('%') {
        return true;
    }
    match rest.get(..7) {
        Some(word) if word.eq_ignore_ascii_case("percent") => {
            !rest[7..].starts_with(|c: char| c.is_alphanumeric())
        }
        _ => false,
    }
}

fn host_of(link: &str) -> &str {
    link.split("://")
        .nth(1)
        .unwrap_or(link)
        .split('/')
        .next()
        .unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_automation_percentage() {
        assert_eq!(
            extract_automation_percentage("Up to 45% of tasks could be automated by 2030"),
            Some(45.0)
        );
        assert_eq!(
            extract_automation_percentage("Automation may affect 12.5 percent of jobs"),
            Some(12.5)
        );
        // No automation context
        assert_eq!(extract_automation_percentage("Revenue grew 45% last year"), None);
        // Out-of-range values skipped
        assert_eq!(
            extract_automation_percentage("Automation: 250% ROI, 30% of roles"),
            Some(30.0)
        );
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("Published Mar 3, 2023"), Some(2023));
        assert_eq!(extract_year("no year here 12345"), None);
        assert_eq!(extract_year("the 2020s and 1999."), Some(1999));
    }

    #[test]
    fn test_response_mapping() {
        let body: SerpResponse = serde_json::from_str(
            r#"{
                "search_metadata": {"status": "Success"},
                "organic_results": [
                    {"position": 1, "title": "Automation and jobs", "link": "https://www.example.org/report", "snippet": "About 60% of occupations have automatable activities.", "date": "Jan 2017"},
                    {"position": 2, "title": "Other", "link": "https://news.example.com/a", "snippet": "Nothing numeric", "source": "Example News"}
                ]
            }"#,
        )
        .unwrap();

        let snippets = to_snippets(body.organic_results);
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].automation_percentage, Some(60.0));
        assert_eq!(snippets[0].year, Some(2017));
        assert_eq!(snippets[0].source, "www.example.org");
        assert_eq!(snippets[0].relevance, 1.0);
        assert_eq!(snippets[1].source, "Example News");
        assert_eq!(snippets[1].automation_percentage, None);
        assert!(snippets[1].relevance < 1.0);
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(SerpClient::new(&SerpConfig::default()).is_err());
    }
}
