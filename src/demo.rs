//! Synthetic traffic for demos and manual testing
//!
//! Only reachable when `demo.enabled` is set. Generated records go through
//! the normal classification path; `random_leak_rate` additionally labels a
//! share of the unlabelled flows with a random leak kind.

use crate::config::DemoConfig;
use crate::pipeline::Pipeline;
use crate::types::flow::ClassifiedFlow;
use crate::types::leak::{Leak, LeakKind};
use crate::types::record::{TransactionRecord, TransportKind};
use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// (method, host, path) samples mixing ordinary and leak-like traffic
const SAMPLE_REQUESTS: &[(&str, &str, &str)] = &[
    ("GET", "api.weather.com", "/v3/location/point"),
    ("POST", "api.instagram.com", "/v1/users/profile"),
    ("GET", "www.google-analytics.com", "/collect"),
    ("POST", "graph.facebook.com", "/v12.0/device_info"),
    ("GET", "cdn.example.com", "/static/app.js"),
    ("GET", "maps.googleapis.com", "/maps/api/geocode/json"),
    ("POST", "api.example.com", "/v2/sync"),
    ("GET", "ads.doubleclick.net", "/pagead/id"),
    ("GET", "api.spotify.com", "/v1/me/player"),
    ("POST", "api.whatsapp.com", "/contacts/upload"),
    ("GET", "images.example.com", "/thumbs/42.webp"),
    ("POST", "telemetry.example.com", "/events?imei=356938035643809"),
];

const STATUSES: &[&str] = &["200", "200", "200", "201", "204", "304", "404", "500"];

pub struct MockTrafficGenerator {
    random_leak_rate: f64,
}

impl MockTrafficGenerator {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            random_leak_rate: config.random_leak_rate.clamp(0.0, 1.0),
        }
    }

    /// Generate a random record
    pub fn record<R: Rng>(&self, rng: &mut R) -> TransactionRecord {
        let (method, host, path) = SAMPLE_REQUESTS[rng.gen_range(0..SAMPLE_REQUESTS.len())];
        let transport = if rng.gen_bool(0.8) {
            TransportKind::Https
        } else {
            TransportKind::Http
        };
        let status = STATUSES[rng.gen_range(0..STATUSES.len())];
        TransactionRecord::new(transport, method, host, path, status)
    }

    /// Generate `count` flows and push them through the pipeline
    pub fn generate(&self, pipeline: &Pipeline, count: usize) -> Vec<Arc<ClassifiedFlow>> {
        let mut rng = rand::thread_rng();
        let flows: Vec<Arc<ClassifiedFlow>> = (0..count)
            .map(|_| {
                let record = self.record(&mut rng);
                let leak = pipeline
                    .classifier()
                    .classify(&record)
                    .or_else(|| self.injected_leak(&mut rng, &record));
                pipeline.publish(ClassifiedFlow::with_generated_id(record, leak))
            })
            .collect();

        info!(
            generated = flows.len(),
            leaks = flows.iter().filter(|f| f.is_leak()).count(),
            "Generated mock traffic"
        );
        flows
    }

    fn injected_leak<R: Rng>(&self, rng: &mut R, record: &TransactionRecord) -> Option<Leak> {
        if self.random_leak_rate <= 0.0 || !rng.gen_bool(self.random_leak_rate) {
            return None;
        }
        let kind = LeakKind::ALL[rng.gen_range(0..LeakKind::ALL.len())];
        Some(Leak::new(
            kind,
            format!("{} (simulated) in request to {}", kind.label(), record.host),
        ))
    }
}
