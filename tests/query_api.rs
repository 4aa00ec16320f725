//! REST surface tests driven through the router without a listener

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use privacy_leak_monitor::config::AppConfig;
use privacy_leak_monitor::metrics::PipelineMetrics;
use privacy_leak_monitor::pipeline::Pipeline;
use privacy_leak_monitor::server::{router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(config: AppConfig) -> (Router, Arc<Pipeline>) {
    let pipeline = Arc::new(Pipeline::from_config(&config, Arc::new(PipelineMetrics::new())));
    (router(AppState::new(pipeline.clone(), config)), pipeline)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn ingest(pipeline: &Pipeline, host: &str, url: &str) {
    let text = format!(
        r#"{{"timestamp":"09:30:00","type":"HTTPS","method":"POST","host":"{}","url":"{}","status":200}}"#,
        host, url
    );
    pipeline.ingest_message(&text).unwrap();
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let (app, _) = app(AppConfig::default());
    let (status, body) = call(&app, Method::GET, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "Privacy Leak Monitor");
    assert_eq!(body["endpoints"]["dashboard"], "/ws/dashboard");
    assert!(body["endpoints"].get("mockData").is_none());
}

#[tokio::test]
async fn test_stats_flows_and_leaks() {
    let (app, pipeline) = app(AppConfig::default());
    ingest(&pipeline, "api.example.com", "/v1/sync");
    ingest(&pipeline, "www.google-analytics.com", "/collect");
    ingest(&pipeline, "api.example.com", "/users/profile");

    let (status, stats) = call(&app, Method::GET, "/api/dashboard/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalFlows"], 3);
    assert_eq!(stats["totalLeaks"], 2);
    assert_eq!(stats["recentFlows"].as_array().unwrap().len(), 3);
    assert_eq!(stats["recentFlows"][0]["url"], "/users/profile");

    let (_, flows) = call(&app, Method::GET, "/api/dashboard/flows").await;
    let flows = flows.as_array().unwrap();
    assert_eq!(flows.len(), 3);
    assert_eq!(flows[0]["url"], "/v1/sync");
    assert_eq!(flows[0]["status"], "200");
    assert_eq!(flows[0]["type"], "HTTPS");
    assert_eq!(flows[0]["leakType"], Value::Null);
    assert!(flows[0].get("body").is_none());

    let (_, leaks) = call(&app, Method::GET, "/api/dashboard/leaks").await;
    let leaks = leaks.as_array().unwrap();
    assert_eq!(leaks.len(), 2);
    assert_eq!(leaks[0]["leakType"], "TRACKING");
    assert_eq!(leaks[1]["leakType"], "PERSONAL_DATA");
}

#[tokio::test]
async fn test_system_status() {
    let (app, pipeline) = app(AppConfig::default());
    ingest(&pipeline, "api.example.com", "/gps/fix");
    pipeline.ingest_message("not json").unwrap_err();

    let (status, body) = call(&app, Method::GET, "/api/system/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["dashboardConnections"], 0);
    assert_eq!(body["totalFlowsStored"], 1);
    assert_eq!(body["totalLeaksDetected"], 1);
    assert_eq!(body["maxFlowsCapacity"], 1000);
    assert_eq!(body["metrics"]["messagesReceived"], 2);
    assert_eq!(body["metrics"]["messagesMalformed"], 1);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_clear_empties_store() {
    let (app, pipeline) = app(AppConfig::default());
    ingest(&pipeline, "api.example.com", "/a");
    ingest(&pipeline, "api.example.com", "/b");

    let (status, body) = call(&app, Method::POST, "/api/system/clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flowsRemoved"], 2);
    assert_eq!(body["flowsRemaining"], 0);
    assert!(pipeline.store().is_empty());

    let (_, stats) = call(&app, Method::GET, "/api/dashboard/stats").await;
    assert_eq!(stats["totalFlows"], 0);
}

#[tokio::test]
async fn test_mock_data_requires_demo_mode() {
    let (app, pipeline) = app(AppConfig::default());
    let (status, body) = call(&app, Method::POST, "/api/test/generate-mock-data").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(pipeline.store().is_empty());
}

#[tokio::test]
async fn test_mock_data_generation() {
    let mut config = AppConfig::default();
    config.demo.enabled = true;
    let (app, pipeline) = app(config);

    let (status, body) = call(&app, Method::POST, "/api/test/generate-mock-data?count=15").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated"], 15);
    assert_eq!(pipeline.store().len(), 15);

    let (status, _) = call(&app, Method::POST, "/api/test/generate-mock-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pipeline.store().len(), 25);

    let (status, body) = call(&app, Method::POST, "/api/test/generate-mock-data?count=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = app(AppConfig::default());
    let (status, body) = call(&app, Method::GET, "/api/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "/api/nope");
}
