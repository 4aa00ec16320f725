//! Ingestion and fan-out counters for the monitor.

use crate::types::leak::LeakKind;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Samples kept for latency percentiles
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the ingestion pipeline
pub struct PipelineMetrics {
    /// Producer messages received
    pub messages_received: AtomicU64,
    /// Flows classified and stored
    pub flows_accepted: AtomicU64,
    /// Messages that were not decodable JSON
    pub messages_malformed: AtomicU64,
    /// Messages that decoded but failed validation
    pub messages_rejected: AtomicU64,
    /// Flows evicted from the store
    pub flows_evicted: AtomicU64,
    /// Observers that connected
    pub observers_connected: AtomicU64,
    /// Observers removed after a failed delivery
    pub observers_dropped: AtomicU64,
    /// Payloads skipped for observers with a full queue
    pub observer_events_skipped: AtomicU64,
    /// Lagging observers brought back in sync
    pub observers_resynced: AtomicU64,
    /// Leaks detected by kind
    leaks_by_kind: RwLock<HashMap<LeakKind, u64>>,
    /// Ingest latencies (in microseconds)
    ingest_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            flows_accepted: AtomicU64::new(0),
            messages_malformed: AtomicU64::new(0),
            messages_rejected: AtomicU64::new(0),
            flows_evicted: AtomicU64::new(0),
            observers_connected: AtomicU64::new(0),
            observers_dropped: AtomicU64::new(0),
            observer_events_skipped: AtomicU64::new(0),
            observers_resynced: AtomicU64::new(0),
            leaks_by_kind: RwLock::new(HashMap::new()),
            ingest_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.messages_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stored flow
    pub fn record_flow(&self, ingest_time: Duration, leak: Option<LeakKind>, evicted: bool) {
        self.flows_accepted.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.flows_evicted.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(kind) = leak {
            *self.leaks_by_kind.write().entry(kind).or_insert(0) += 1;
        }

        let mut times = self.ingest_times.write();
        times.push(ingest_time.as_micros() as u64);
        if times.len() > LATENCY_WINDOW {
            times.drain(0..LATENCY_WINDOW / 2);
        }
    }

    pub fn record_observer_connected(&self) {
        self.observers_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_observers_dropped(&self, count: usize) {
        if count > 0 {
            self.observers_dropped
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_observers_lagging(&self, count: usize) {
        if count > 0 {
            self.observer_events_skipped
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_observer_resynced(&self) {
        self.observers_resynced.fetch_add(1, Ordering::Relaxed);
    }

    /// Get ingest latency statistics
    pub fn get_ingest_stats(&self) -> LatencyStats {
        let mut sorted: Vec<u64> = self.ingest_times.read().clone();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Get leaks detected by kind since startup
    pub fn get_leaks_by_kind(&self) -> HashMap<LeakKind, u64> {
        self.leaks_by_kind.read().clone()
    }

    /// Get current throughput (flows per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.flows_accepted.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            flows_accepted: self.flows_accepted.load(Ordering::Relaxed),
            messages_malformed: self.messages_malformed.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            flows_evicted: self.flows_evicted.load(Ordering::Relaxed),
            observers_connected: self.observers_connected.load(Ordering::Relaxed),
            observers_dropped: self.observers_dropped.load(Ordering::Relaxed),
            observer_events_skipped: self.observer_events_skipped.load(Ordering::Relaxed),
            observers_resynced: self.observers_resynced.load(Ordering::Relaxed),
            leaks_by_kind: self
                .get_leaks_by_kind()
                .into_iter()
                .map(|(kind, count)| (kind.as_str().to_string(), count))
                .collect(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let latency = self.get_ingest_stats();
        let total_leaks: u64 = snapshot.leaks_by_kind.values().sum();

        info!(
            received = snapshot.messages_received,
            accepted = snapshot.flows_accepted,
            malformed = snapshot.messages_malformed,
            rejected = snapshot.messages_rejected,
            evicted = snapshot.flows_evicted,
            throughput = format!("{:.1} flows/s", self.get_throughput()),
            "Ingestion summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Ingest latency"
        );
        info!(
            total = total_leaks,
            by_kind = ?snapshot.leaks_by_kind,
            "Privacy leaks detected"
        );
        info!(
            connected = snapshot.observers_connected,
            dropped = snapshot.observers_dropped,
            skipped = snapshot.observer_events_skipped,
            resynced = snapshot.observers_resynced,
            "Observers"
        );
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Ingest latency statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable counters for the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub flows_accepted: u64,
    pub messages_malformed: u64,
    pub messages_rejected: u64,
    pub flows_evicted: u64,
    pub observers_connected: u64,
    pub observers_dropped: u64,
    pub observer_events_skipped: u64,
    pub observers_resynced: u64,
    pub leaks_by_kind: HashMap<String, u64>,
    pub uptime_secs: u64,
}

/// Periodic summary logger
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_received();
        metrics.record_received();
        metrics.record_received();
        metrics.record_malformed();
        metrics.record_flow(Duration::from_micros(100), Some(LeakKind::GpsData), false);
        metrics.record_flow(Duration::from_micros(300), None, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.messages_malformed, 1);
        assert_eq!(snapshot.flows_accepted, 2);
        assert_eq!(snapshot.flows_evicted, 1);
        assert_eq!(snapshot.leaks_by_kind.get("GPS_DATA"), Some(&1));
    }

    #[test]
    fn test_latency_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_ingest_stats().count, 0);

        for us in [10, 20, 30, 40] {
            metrics.record_flow(Duration::from_micros(us), None, false);
        }

        let stats = metrics.get_ingest_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 25);
        assert_eq!(stats.max_us, 40);
    }

    #[test]
    fn test_observer_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_observer_connected();
        metrics.record_observers_dropped(0);
        metrics.record_observers_dropped(2);
        metrics.record_observers_lagging(3);
        metrics.record_observer_resynced();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.observers_connected, 1);
        assert_eq!(snapshot.observers_dropped, 2);
        assert_eq!(snapshot.observer_events_skipped, 3);
        assert_eq!(snapshot.observers_resynced, 1);
    }
}
