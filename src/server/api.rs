//! Point-in-time REST handlers

use super::error::ApiError;
use super::AppState;
use crate::demo::MockTrafficGenerator;
use crate::metrics::MetricsSnapshot;
use crate::types::event::DashboardStats;
use crate::types::flow::ClassifiedFlow;
use axum::extract::{Query, State};
use axum::http::Uri;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Current status of the service
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: &'static str,
    pub dashboard_connections: usize,
    pub total_flows_stored: usize,
    pub total_leaks_detected: usize,
    pub max_flows_capacity: usize,
    pub metrics: MetricsSnapshot,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub message: &'static str,
    pub flows_removed: usize,
    pub flows_remaining: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDataResponse {
    pub message: String,
    pub generated: usize,
    pub leaks: usize,
}

#[derive(Debug, Deserialize)]
pub struct MockDataParams {
    pub count: Option<usize>,
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let mut endpoints = json!({
        "traffic": "/ws/traffic",
        "dashboard": "/ws/dashboard",
        "stats": "/api/dashboard/stats",
        "flows": "/api/dashboard/flows",
        "leaks": "/api/dashboard/leaks",
        "status": "/api/system/status",
        "clear": "/api/system/clear",
    });
    if state.config.demo.enabled {
        endpoints["mockData"] = json!("/api/test/generate-mock-data");
    }

    Json(json!({
        "service": "Privacy Leak Monitor",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

pub async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.pipeline.stats())
}

pub async fn all_flows(State(state): State<AppState>) -> Json<Vec<ClassifiedFlow>> {
    Json(owned(state.pipeline.flows()))
}

pub async fn privacy_leaks(State(state): State<AppState>) -> Json<Vec<ClassifiedFlow>> {
    Json(owned(state.pipeline.leaks()))
}

pub async fn system_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let pipeline = &state.pipeline;
    let stats = pipeline.stats();

    Json(SystemStatus {
        status: "running",
        dashboard_connections: pipeline.registry().len(),
        total_flows_stored: stats.total_flows,
        total_leaks_detected: stats.total_leaks,
        max_flows_capacity: pipeline.store().capacity(),
        metrics: pipeline.metrics().snapshot(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn clear_flows(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.pipeline.clear();
    Json(ClearResponse {
        message: "All traffic data cleared",
        flows_removed: removed,
        flows_remaining: state.pipeline.store().len(),
    })
}

pub async fn generate_mock_data(
    State(state): State<AppState>,
    Query(params): Query<MockDataParams>,
) -> Result<Json<MockDataResponse>, ApiError> {
    let capacity = state.pipeline.store().capacity();
    let count = params.count.unwrap_or(state.config.demo.batch_size);
    if count == 0 || count > capacity {
        return Err(ApiError::BadRequest(format!(
            "count must be between 1 and {}",
            capacity
        )));
    }

    let generator = MockTrafficGenerator::new(&state.config.demo);
    let flows = generator.generate(&state.pipeline, count);
    let leaks = flows.iter().filter(|f| f.is_leak()).count();

    Ok(Json(MockDataResponse {
        message: format!("Generated {} mock flows", flows.len()),
        generated: flows.len(),
        leaks,
    }))
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

fn owned(flows: Vec<Arc<ClassifiedFlow>>) -> Vec<ClassifiedFlow> {
    flows.iter().map(|flow| ClassifiedFlow::clone(flow)).collect()
}
