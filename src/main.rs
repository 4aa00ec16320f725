//! Privacy Leak Monitor - Main Entry Point
//!
//! Accepts transaction records on `/ws/traffic`, classifies and retains them,
//! and streams flows and statistics to observers on `/ws/dashboard`.
//!
//! Usage: privacy-leak-monitor [config-path]

use anyhow::{Context, Result};
use privacy_leak_monitor::{
    config::{AppConfig, LogFormat, LoggingConfig, DEFAULT_CONFIG_PATH},
    metrics::{MetricsReporter, PipelineMetrics},
    pipeline::{Pipeline, StatsBroadcaster},
    server::{router, AppState},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Initialize logging
    init_tracing(&config.logging)?;

    info!("Starting Privacy Leak Monitor");
    info!(
        bind_addr = %config.server.bind_addr,
        capacity = config.store.capacity,
        observer_queue = config.server.observer_queue,
        observer_lag_timeout_secs = config.server.observer_lag_timeout_secs,
        stats_interval_secs = config.broadcast.stats_interval_secs,
        demo = config.demo.enabled,
        "Configuration loaded"
    );

    // Initialize metrics and pipeline
    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Arc::new(Pipeline::from_config(&config, metrics.clone()));
    info!(
        "Classifier initialized with {} rules: {:?}",
        pipeline.classifier().rule_count(),
        pipeline.classifier().rule_names()
    );

    // Background tasks
    let mut tasks = Vec::new();
    if config.broadcast.stats_interval_secs > 0 {
        let broadcaster = StatsBroadcaster::new(
            pipeline.clone(),
            Duration::from_secs(config.broadcast.stats_interval_secs),
        );
        tasks.push(tokio::spawn(broadcaster.start()));
    }
    if config.logging.summary_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.logging.summary_interval_secs);
        tasks.push(tokio::spawn(reporter.start()));
    }

    let bind_addr = config.server.bind_addr.clone();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = router(AppState::new(pipeline, config))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Producer endpoint: ws://{}/ws/traffic", bind_addr);
    info!("Dashboard endpoint: ws://{}/ws/dashboard", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Print final summary
    info!("Monitor shutting down...");
    for task in tasks {
        task.abort();
    }
    metrics.print_summary();

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive(format!("privacy_leak_monitor={}", logging.level).parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
