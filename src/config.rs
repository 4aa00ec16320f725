//! Configuration management for the privacy leak monitor

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `LEAK_MONITOR__STORE__CAPACITY`
pub const ENV_PREFIX: &str = "LEAK_MONITOR";

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub broadcast: BroadcastConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket server binds to
    pub bind_addr: String,
    /// Outbound messages buffered per observer; when full the observer
    /// skips events until it drains and is resynced with stats
    pub observer_queue: usize,
    /// Seconds an observer may stay full before it is dropped
    pub observer_lag_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8001".to_string(),
            observer_queue: 64,
            observer_lag_timeout_secs: 10,
        }
    }
}

/// Flow retention configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum retained flows; the oldest is evicted beyond this
    pub capacity: usize,
    /// Length of `recentFlows` in stats messages
    pub recent_flows: usize,
    /// Length of `privacyLeaks` in stats messages
    pub privacy_leaks: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            recent_flows: 10,
            privacy_leaks: 50,
        }
    }
}

/// Observer push configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Interval between periodic stats pushes; 0 disables them
    pub stats_interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json)
    pub format: LogFormat,
    /// Interval between metrics summaries; 0 disables them
    pub summary_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            summary_interval_secs: 60,
        }
    }
}

/// Synthetic traffic generation, for demos and manual testing only
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Expose the mock data endpoint
    pub enabled: bool,
    /// Chance that an unlabelled synthetic flow is given a random leak
    pub random_leak_rate: f64,
    /// Flows generated per request when no count is given
    pub batch_size: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            random_leak_rate: 0.0,
            batch_size: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, layered with environment
    /// overrides. A missing file leaves the defaults in place.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.store.capacity == 0 {
            anyhow::bail!("store.capacity must be at least 1");
        }
        if self.server.observer_queue == 0 {
            anyhow::bail!("server.observer_queue must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.demo.random_leak_rate) {
            anyhow::bail!(
                "demo.random_leak_rate must be between 0 and 1, got {}",
                self.demo.random_leak_rate
            );
        }
        Ok(())
    }
}
