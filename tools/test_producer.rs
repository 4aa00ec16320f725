//! Test Traffic Producer
//!
//! Generates transaction records and streams them to the monitor's
//! `/ws/traffic` endpoint for pipeline testing.
//!
//! Usage: test_producer [url] [count] [leak-rate] [delay-ms]

use chrono::Utc;
use futures::SinkExt;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

/// Record structure matching the monitor's expected format
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrafficRecord {
    timestamp: String,
    flow_id: String,
    #[serde(rename = "type")]
    transport: &'static str,
    method: &'static str,
    host: String,
    url: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

/// Traffic generator for testing
struct TrafficGenerator {
    rng: rand::rngs::ThreadRng,
    flow_counter: u64,
}

impl TrafficGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            flow_counter: 0,
        }
    }

    /// Generate ordinary app traffic
    fn generate_clean(&mut self) -> TrafficRecord {
        let host = self
            .random_choice(&[
                "cdn.example.com",
                "api.example.com",
                "images.example.com",
                "static.shop.example",
            ])
            .to_string();
        let url = self
            .random_choice(&[
                "/static/app.js",
                "/v2/sync",
                "/thumbs/42.webp",
                "/api/products?page=2",
                "/health",
            ])
            .to_string();
        let method = self.random_choice(&["GET", "GET", "POST"]);
        self.record(method, host, url, None)
    }

    /// Generate traffic that carries privacy-sensitive data
    fn generate_leaky(&mut self) -> TrafficRecord {
        match self.rng.gen_range(0..5) {
            0 => {
                let url = format!(
                    "/v1/location/update?lat={:.4}&lon={:.4}",
                    self.rng.gen_range(-90.0_f64..90.0),
                    self.rng.gen_range(-180.0_f64..180.0)
                );
                self.record("POST", "api.weather.example".to_string(), url, None)
            }
            1 => {
                let url = format!("/register?device_id={:016x}", self.rng.gen::<u64>());
                self.record("POST", "telemetry.example.com".to_string(), url, None)
            }
            2 => {
                let url = self
                    .random_choice(&["/v1/users/profile", "/contacts/upload", "/account/email"])
                    .to_string();
                self.record("POST", "api.social.example".to_string(), url, None)
            }
            3 => {
                let host = self
                    .random_choice(&[
                        "www.google-analytics.com",
                        "graph.facebook.com",
                        "ads.doubleclick.net",
                        "www.googletagmanager.com",
                    ])
                    .to_string();
                self.record("GET", host, "/collect".to_string(), None)
            }
            _ => {
                let body = format!(
                    r#"{{"contact":"user{}@mail.example","phone":"555-{:03}-{:04}"}}"#,
                    self.rng.gen_range(1..1000),
                    self.rng.gen_range(100..1000),
                    self.rng.gen_range(0..10000)
                );
                self.record(
                    "POST",
                    "api.example.com".to_string(),
                    "/v2/feedback".to_string(),
                    Some(body),
                )
            }
        }
    }

    fn record(
        &mut self,
        method: &'static str,
        host: String,
        url: String,
        body: Option<String>,
    ) -> TrafficRecord {
        self.flow_counter += 1;
        let transport = if self.rng.gen_bool(0.8) { "HTTPS" } else { "HTTP" };
        let status = self.random_choice(&["200", "200", "201", "204", "404"]).to_string();

        TrafficRecord {
            timestamp: Utc::now().format("%H:%M:%S").to_string(),
            flow_id: format!("flow_{:08}", self.flow_counter),
            transport,
            method,
            host,
            url,
            status,
            body,
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Traffic Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("ws://localhost:8001/ws/traffic");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let leak_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.3_f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        url = %url,
        count = count,
        leak_rate = leak_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to the monitor
    let mut socket = match tokio_tungstenite::connect_async(url).await {
        Ok((socket, _)) => {
            info!("Connected to monitor");
            socket
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to monitor. Running in dry-run mode.");
            return run_dry_mode(count, leak_rate, delay_ms).await;
        }
    };

    let mut generator = TrafficGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to send {} records...", count);

    let mut clean_count = 0;
    let mut leaky_count = 0;

    for i in 0..count {
        let record = if rng.gen_bool(leak_rate) {
            leaky_count += 1;
            generator.generate_leaky()
        } else {
            clean_count += 1;
            generator.generate_clean()
        };

        let payload = serde_json::to_string(&record)?;
        socket.send(Message::text(payload)).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} records ({} clean, {} leaky)",
                i + 1,
                count,
                clean_count,
                leaky_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    socket.close(None).await?;

    info!(
        "Completed! Sent {} records ({} clean, {} leaky)",
        count, clean_count, leaky_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, leak_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no monitor connection)");

    let mut generator = TrafficGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let record = if rng.gen_bool(leak_rate) {
            generator.generate_leaky()
        } else {
            generator.generate_clean()
        };

        let json = serde_json::to_string_pretty(&record)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample record {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
