//! Integration tests for apo-engine HTTP endpoints
//!
//! All tests run against synthetic data (no live sources).

use apo_common::FeatureFlags;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

use apo_engine::{build_router, ApoEngine, AppState, EngineConfig, EngineSources};

/// Test helper: app with mock-only engine
fn setup_app() -> axum::Router {
    let engine = ApoEngine::new(EngineConfig::default(), EngineSources::mock_only());
    let features = FeatureFlags {
        use_onet: false,
        use_serp: false,
    };
    build_router(AppState::new(engine, features))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = setup_app().oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "apo-engine");
    assert_eq!(body["onet_enabled"], false);
    assert!(body["version"].is_string());
    assert!(body.get("last_error").is_none());
}

// =============================================================================
// APO
// =============================================================================

#[tokio::test]
async fn test_get_apo_returns_camel_case_result() {
    let response = setup_app()
        .oneshot(test_request(
            "GET",
            "/api/apo/43-4051.00?industry=Finance&region=Western%20Europe&timeframeYears=3&forecastMonths=12",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["occupationCode"], "43-4051.00");
    let apo = body["predictedApo"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&apo));
    assert_eq!(body["usedMockData"], true);
    assert_eq!(body["usedFallback"], false);
    assert!(body["factorBreakdown"]["regionalFactors"]["highIncome"].is_number());
    assert_eq!(body["timeProjections"].as_array().unwrap().len(), 3);
    assert_eq!(body["sources"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_get_apo_rejects_malformed_code() {
    let response = setup_app()
        .oneshot(test_request("GET", "/api/apo/15-1252"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("15-1252"));
}

#[tokio::test]
async fn test_get_apo_rejects_bad_forecast_months() {
    let response = setup_app()
        .oneshot(test_request("GET", "/api/apo/15-1252.00?forecastMonths=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Factors
// =============================================================================

#[tokio::test]
async fn test_factor_round_trip() {
    let app = setup_app();

    let seeded = app
        .clone()
        .oneshot(test_request("GET", "/api/apo/15-1252.00/factors"))
        .await
        .unwrap();
    assert_eq!(seeded.status(), StatusCode::OK);
    assert_eq!(extract_json(seeded.into_body()).await.as_array().unwrap().len(), 5);

    let update = json!([{
        "id": "code-review",
        "name": "Code Review",
        "category": "cognitive",
        "weight": 0.8,
        "complexity": 4.0,
        "repetitiveness": 0.3,
        "humanAiCollaboration": 0.7,
        "emergingTechImpact": 0.9,
        "industrySpecific": false
    }]);
    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/apo/15-1252.00/factors", &update))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let apo = app
        .oneshot(test_request("GET", "/api/apo/15-1252.00"))
        .await
        .unwrap();
    let body = extract_json(apo.into_body()).await;
    assert_eq!(body["factorTrends"][0]["name"], "Code Review");
}

#[tokio::test]
async fn test_empty_factor_set_rejected() {
    let response = setup_app()
        .oneshot(json_request("PUT", "/api/apo/15-1252.00/factors", &json!([])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Obsolescence
// =============================================================================

#[tokio::test]
async fn test_obsolescence_timeline() {
    let response = setup_app()
        .oneshot(test_request(
            "GET",
            "/api/obsolescence?skills=Technical%20Skills,Leadership&years=4",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["years"], 4);
    let technical = body["timelines"]["Technical Skills"].as_array().unwrap();
    let leadership = body["timelines"]["Leadership"].as_array().unwrap();
    assert_eq!(technical.len(), 4);
    assert!(technical[3].as_f64().unwrap() > leadership[3].as_f64().unwrap());
}

#[tokio::test]
async fn test_obsolescence_rejects_zero_years() {
    let response = setup_app()
        .oneshot(test_request("GET", "/api/obsolescence?skills=Leadership&years=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Scenarios and feedback
// =============================================================================

#[tokio::test]
async fn test_post_scenarios() {
    let body = json!([
        {"name": "Baseline"},
        {
            "name": "Rapid AI",
            "description": "Emerging technology doubles in weight",
            "factorAdjustments": {"emergingTechImpact": 2.0},
            "timeHorizonYears": [1, 4]
        }
    ]);
    let response = setup_app()
        .oneshot(json_request(
            "POST",
            "/api/apo/15-1252.00/scenarios?industry=Technology",
            &body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let results = extract_json(response.into_body()).await;
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["scenarioName"], "Baseline");
    assert_eq!(results[0]["timeProjections"].as_array().unwrap().len(), 3);
    assert_eq!(results[1]["timeProjections"].as_array().unwrap().len(), 2);
    assert!(results[1]["weights"]["emergingTechImpact"].as_f64().unwrap() > 0.2);
    assert!(
        results[1]["adjustedScore"].as_f64().unwrap()
            >= results[1]["baselineScore"].as_f64().unwrap()
    );
}

#[tokio::test]
async fn test_post_scenarios_rejects_bad_adjustments() {
    let body = json!([{"name": "Negative", "factorAdjustments": {"taskComplexity": -1.0}}]);
    let response = setup_app()
        .oneshot(json_request("POST", "/api/apo/15-1252.00/scenarios", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = setup_app()
        .oneshot(json_request("POST", "/api/apo/15-1252.00/scenarios", &json!([])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_feedback_updates_weights() {
    let app = setup_app();

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/apo/43-4051.00/factors"))
        .await
        .unwrap();
    let seed = extract_json(response.into_body()).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/apo/43-4051.00/feedback",
            &json!({"actualScore": 10.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = extract_json(response.into_body()).await;

    let before = seed[0]["weight"].as_f64().unwrap();
    let after = updated[0]["weight"].as_f64().unwrap();
    assert!((after - before * 0.95).abs() < 1e-9);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/apo/43-4051.00/feedback",
            &json!({"actualScore": 250.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Regions and timelines
// =============================================================================

#[tokio::test]
async fn test_region_comparison() {
    let response = setup_app()
        .oneshot(test_request("GET", "/api/regions/compare?regions=Africa,NA"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let ranked = body.as_array().unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["regionCode"], "AFR");
    assert_eq!(ranked[1]["ranking"], 1);

    let response = setup_app()
        .oneshot(test_request("GET", "/api/regions/compare?regions=Atlantis"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_growth_timelines() {
    let response = setup_app()
        .oneshot(test_request("GET", "/api/timelines?industry=Technology&region=Africa"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["years"], 5);
    assert_eq!(body["industry"], "Technology");
    assert_eq!(body["industryTimeline"].as_array().unwrap().len(), 5);
    assert_eq!(body["regionalTimeline"].as_array().unwrap().len(), 5);

    let response = setup_app()
        .oneshot(test_request("GET", "/api/timelines?years=51"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
