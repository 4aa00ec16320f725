//! HTTP and WebSocket surface
//!
//! # Routes
//!
//! - `GET /` - Service banner
//! - `GET /ws/traffic` - Producer WebSocket, one transaction record per message
//! - `GET /ws/dashboard` - Observer WebSocket, receives `new_traffic` and `stats_update`
//! - `GET /api/dashboard/stats` - Current statistics
//! - `GET /api/dashboard/flows` - All retained flows
//! - `GET /api/dashboard/leaks` - Retained flows with a leak
//! - `GET /api/system/status` - Service status and counters
//! - `POST /api/system/clear` - Drop retained flows
//! - `POST /api/test/generate-mock-data` - Synthetic traffic (only with `demo.enabled`)

mod api;
mod error;
mod ingest;
mod observer;

pub use self::error::ApiError;
pub use self::ingest::handle_producer;
pub use self::observer::handle_observer;

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared state available to all handlers
#[derive(Clone)]
pub struct AppState {
    /// The process-wide pipeline
    pub pipeline: Arc<Pipeline>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: AppConfig) -> Self {
        Self {
            pipeline,
            config: Arc::new(config),
        }
    }
}

/// Build the complete router
pub fn router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/dashboard/stats", get(api::dashboard_stats))
        .route("/dashboard/flows", get(api::all_flows))
        .route("/dashboard/leaks", get(api::privacy_leaks))
        .route("/system/status", get(api::system_status))
        .route("/system/clear", post(api::clear_flows));

    if state.config.demo.enabled {
        api = api.route("/test/generate-mock-data", post(api::generate_mock_data));
    }

    Router::new()
        .route("/", get(api::root))
        .route("/ws/traffic", get(ingest::traffic_socket))
        .route("/ws/dashboard", get(observer::dashboard_socket))
        .nest("/api", api)
        .fallback(api::not_found)
        .with_state(state)
}
