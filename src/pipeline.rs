//! Ingestion → classification → retention → fan-out
//!
//! `Pipeline` owns the one flow store and the one observer registry of the
//! process. Every operation that both reads the store and broadcasts runs
//! under a single publish lock, which gives two guarantees:
//!
//! - flows reach every observer in the order they were appended;
//! - a newly registered observer sees each flow exactly once, either in its
//!   initial stats or as a later `new_traffic` event.
//!
//! Broadcasting only queues payloads, so no I/O happens under the lock. An
//! observer whose queue fills up skips events until it is resynced with a
//! fresh stats message, which keeps the second guarantee in place of the
//! skipped `new_traffic` events.

use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::error::IngestError;
use crate::metrics::PipelineMetrics;
use crate::registry::{
    BroadcastOutcome, ObserverId, ObserverRegistry, ObserverSender, Payload, DEFAULT_LAG_TIMEOUT,
};
use crate::store::FlowStore;
use crate::types::event::{DashboardStats, ObserverEvent};
use crate::types::flow::ClassifiedFlow;
use crate::types::record::{InboundMessage, TransactionRecord};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Bounds on the lists carried by stats messages
#[derive(Debug, Clone, Copy)]
pub struct StatsLimits {
    pub recent_flows: usize,
    pub privacy_leaks: usize,
}

impl Default for StatsLimits {
    fn default() -> Self {
        Self {
            recent_flows: 10,
            privacy_leaks: 50,
        }
    }
}

pub struct Pipeline {
    classifier: Classifier,
    store: FlowStore,
    registry: ObserverRegistry,
    metrics: Arc<PipelineMetrics>,
    limits: StatsLimits,
    publish: Mutex<()>,
}

impl Pipeline {
    /// Create a pipeline with the default classifier
    pub fn new(capacity: usize, limits: StatsLimits, metrics: Arc<PipelineMetrics>) -> Self {
        Self::with_classifier(Classifier::new(), capacity, limits, metrics)
    }

    pub fn with_classifier(
        classifier: Classifier,
        capacity: usize,
        limits: StatsLimits,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            classifier,
            store: FlowStore::new(capacity),
            registry: ObserverRegistry::with_lag_timeout(DEFAULT_LAG_TIMEOUT),
            metrics,
            limits,
            publish: Mutex::new(()),
        }
    }

    /// Create a pipeline from application configuration
    pub fn from_config(config: &AppConfig, metrics: Arc<PipelineMetrics>) -> Self {
        let limits = StatsLimits {
            recent_flows: config.store.recent_flows,
            privacy_leaks: config.store.privacy_leaks,
        };
        Self::new(config.store.capacity, limits, metrics).with_lag_timeout(Duration::from_secs(
            config.server.observer_lag_timeout_secs,
        ))
    }

    /// Set how long an observer may stay lagging before it is dropped.
    /// Only meaningful before any observer registers.
    pub fn with_lag_timeout(mut self, lag_timeout: Duration) -> Self {
        self.registry = ObserverRegistry::with_lag_timeout(lag_timeout);
        self
    }

    /// Handle one raw producer message.
    ///
    /// Errors are soft: the caller logs them and keeps the connection.
    pub fn ingest_message(&self, text: &str) -> Result<Arc<ClassifiedFlow>, IngestError> {
        self.metrics.record_received();

        match InboundMessage::parse(text) {
            Ok(message) => Ok(self.ingest(message.record, message.flow_id)),
            Err(e) => {
                if e.is_malformed() {
                    self.metrics.record_malformed();
                } else {
                    self.metrics.record_rejected();
                }
                Err(e)
            }
        }
    }

    /// Handle one binary producer frame, which must hold UTF-8 JSON
    pub fn ingest_bytes(&self, bytes: &[u8]) -> Result<Arc<ClassifiedFlow>, IngestError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.ingest_message(text),
            Err(_) => {
                self.metrics.record_received();
                self.metrics.record_malformed();
                Err(IngestError::NotUtf8)
            }
        }
    }

    /// Classify a record, store it and broadcast it
    pub fn ingest(&self, record: TransactionRecord, flow_id: Option<String>) -> Arc<ClassifiedFlow> {
        let leak = self.classifier.classify(&record);
        let flow = match flow_id {
            Some(id) => ClassifiedFlow::new(id, record, leak),
            None => ClassifiedFlow::with_generated_id(record, leak),
        };
        self.publish(flow)
    }

    /// Store an already classified flow and broadcast it to observers
    pub fn publish(&self, flow: ClassifiedFlow) -> Arc<ClassifiedFlow> {
        let started = Instant::now();
        let flow = Arc::new(flow);
        let payload = encode(&ObserverEvent::NewTraffic(&flow));

        let (evicted, outcome) = {
            let _guard = self.publish.lock();
            let evicted = self.store.append(flow.clone());
            let outcome = payload.map(|payload| self.registry.broadcast(&payload));
            (evicted, outcome)
        };

        self.record_outcome(outcome);
        self.metrics
            .record_flow(started.elapsed(), flow.leak_kind(), evicted.is_some());

        match flow.leak() {
            Some(leak) => warn!(
                flow_id = %flow.flow_id(),
                leak_type = %leak.kind(),
                detail = %leak.detail(),
                "Privacy leak detected"
            ),
            None => debug!(
                flow_id = %flow.flow_id(),
                method = %flow.record().method,
                host = %flow.record().host,
                url = %flow.record().url,
                "Flow stored"
            ),
        }

        flow
    }

    /// Register an observer; its first message is the current stats.
    ///
    /// Returns `None` if the initial stats could not be encoded or queued,
    /// in which case the observer is not registered.
    pub fn register_observer(&self, sender: ObserverSender) -> Option<ObserverId> {
        let id = {
            let _guard = self.publish.lock();
            let stats = self.stats();
            let initial = encode(&ObserverEvent::StatsUpdate(&stats))?;
            self.registry.register(sender, initial)?
        };

        self.metrics.record_observer_connected();
        info!(
            observer_id = id,
            observers = self.registry.len(),
            "Observer connected"
        );
        Some(id)
    }

    /// Remove an observer; safe to call more than once
    pub fn unregister_observer(&self, id: ObserverId) {
        if self.registry.unregister(id) {
            info!(
                observer_id = id,
                observers = self.registry.len(),
                "Observer disconnected"
            );
        }
    }

    /// Bring a lagging observer back in sync with a fresh stats message.
    ///
    /// Called by the observer's connection task once its queue is drained.
    /// Returns true if a resync was queued.
    pub fn resync_observer(&self, id: ObserverId) -> bool {
        if !self.registry.is_lagging(id) {
            return false;
        }

        let resynced = {
            let _guard = self.publish.lock();
            let stats = self.stats();
            match encode(&ObserverEvent::StatsUpdate(&stats)) {
                Some(payload) => self.registry.resync(id, payload),
                None => false,
            }
        };

        if resynced {
            self.metrics.record_observer_resynced();
            debug!(observer_id = id, "Lagging observer resynced");
        }
        resynced
    }

    /// Push current stats to every observer
    pub fn broadcast_stats(&self) -> BroadcastOutcome {
        let outcome = {
            let _guard = self.publish.lock();
            if self.registry.is_empty() {
                return BroadcastOutcome::default();
            }
            let stats = self.stats();
            encode(&ObserverEvent::StatsUpdate(&stats))
                .map(|payload| self.registry.broadcast(&payload))
        };

        self.record_outcome(outcome);
        outcome.unwrap_or_default()
    }

    /// Drop all retained flows and push the emptied stats to observers
    pub fn clear(&self) -> usize {
        let (dropped, outcome) = {
            let _guard = self.publish.lock();
            let dropped = self.store.clear();
            let stats = self.stats();
            let outcome = encode(&ObserverEvent::StatsUpdate(&stats))
                .map(|payload| self.registry.broadcast(&payload));
            (dropped, outcome)
        };

        self.record_outcome(outcome);
        info!(dropped = dropped, "Flow store cleared");
        dropped
    }

    /// Current statistics
    pub fn stats(&self) -> DashboardStats {
        self.store
            .stats(self.limits.recent_flows, self.limits.privacy_leaks)
    }

    /// All retained flows, oldest first
    pub fn flows(&self) -> Vec<Arc<ClassifiedFlow>> {
        self.store.snapshot()
    }

    /// Retained flows carrying a leak, oldest first
    pub fn leaks(&self) -> Vec<Arc<ClassifiedFlow>> {
        self.store.leaks()
    }

    pub fn store(&self) -> &FlowStore {
        &self.store
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn record_outcome(&self, outcome: Option<BroadcastOutcome>) {
        if let Some(outcome) = outcome {
            self.metrics.record_observers_dropped(outcome.dropped);
            self.metrics.record_observers_lagging(outcome.lagging);
            if outcome.dropped > 0 {
                info!(
                    dropped = outcome.dropped,
                    observers = self.registry.len(),
                    "Dropped unresponsive observers"
                );
            }
        }
    }
}

fn encode(event: &ObserverEvent<'_>) -> Option<Payload> {
    match event.encode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!(error = %e, "Failed to encode observer event");
            None
        }
    }
}

/// Periodic stats push; also lets observers notice a live connection
pub struct StatsBroadcaster {
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

impl StatsBroadcaster {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Start the periodic broadcast task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let outcome = self.pipeline.broadcast_stats();
            debug!(
                delivered = outcome.delivered,
                lagging = outcome.lagging,
                dropped = outcome.dropped,
                "Periodic stats pushed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::leak::LeakKind;
    use crate::types::record::TransportKind;
    use tokio::sync::mpsc;

    fn pipeline(capacity: usize) -> Pipeline {
        Pipeline::new(capacity, StatsLimits::default(), Arc::new(PipelineMetrics::new()))
    }

    fn message(url: &str) -> String {
        format!(
            r#"{{"timestamp":"12:00:00","type":"HTTPS","method":"GET","host":"api.example.com","url":"{}","status":"200"}}"#,
            url
        )
    }

    fn event_type(payload: &str) -> String {
        let json: serde_json::Value = serde_json::from_str(payload).unwrap();
        json["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_location_scenario() {
        let pipeline = pipeline(10);
        let flow = pipeline.ingest_message(&message("/location/update")).unwrap();

        assert!(!flow.flow_id().is_empty());
        assert_eq!(flow.leak_kind(), Some(LeakKind::GpsData));
        assert_eq!(pipeline.store().len(), 1);
    }

    #[test]
    fn test_producer_flow_id_kept() {
        let pipeline = pipeline(10);
        let text = r#"{"timestamp":"t","flowId":"flow_42","type":"HTTP","method":"GET","host":"cdn.example.com","url":"/user/preferences","status":"200"}"#;
        let flow = pipeline.ingest_message(text).unwrap();

        assert_eq!(flow.flow_id(), "flow_42");
        assert_eq!(flow.leak_kind(), None);
        assert_eq!(flow.leak_detail(), None);
    }

    #[test]
    fn test_bad_messages_counted_not_stored() {
        let pipeline = pipeline(10);
        assert!(pipeline.ingest_message("{oops").is_err());
        assert!(pipeline.ingest_message(r#"{"timestamp":"t"}"#).is_err());
        pipeline.ingest_message(&message("/ok")).unwrap();

        let metrics = pipeline.metrics().snapshot();
        assert_eq!(metrics.messages_received, 3);
        assert_eq!(metrics.messages_malformed, 1);
        assert_eq!(metrics.messages_rejected, 1);
        assert_eq!(metrics.flows_accepted, 1);
        assert_eq!(pipeline.store().len(), 1);
    }

    #[test]
    fn test_binary_frames() {
        let pipeline = pipeline(10);
        let flow = pipeline.ingest_bytes(message("/gps").as_bytes()).unwrap();
        assert_eq!(flow.leak_kind(), Some(LeakKind::GpsData));

        let err = pipeline.ingest_bytes(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, IngestError::NotUtf8));
        assert_eq!(pipeline.metrics().snapshot().messages_malformed, 1);
        assert_eq!(pipeline.store().len(), 1);
    }

    #[test]
    fn test_stats_totals() {
        let pipeline = pipeline(100);
        let urls = ["/gps", "/a", "/b", "/imei", "/c", "/email", "/d"];
        for url in urls {
            pipeline.ingest_message(&message(url)).unwrap();
        }

        let stats = pipeline.stats();
        assert_eq!(stats.total_flows, 7);
        assert_eq!(stats.total_leaks, 3);
        assert!(stats
            .privacy_leaks
            .iter()
            .all(|f| f.leak_kind().is_some() && f.leak_detail().is_some()));
    }

    #[test]
    fn test_observer_receives_initial_stats_then_flows_in_order() {
        let pipeline = pipeline(10);
        pipeline.ingest_message(&message("/before")).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        pipeline.register_observer(tx).unwrap();

        let ids: Vec<String> = (0..3)
            .map(|i| {
                let flow = pipeline.ingest_message(&message(&format!("/after/{}", i))).unwrap();
                flow.flow_id().to_string()
            })
            .collect();

        let initial = rx.try_recv().unwrap();
        assert_eq!(event_type(&initial), "stats_update");
        let json: serde_json::Value = serde_json::from_str(&initial).unwrap();
        assert_eq!(json["data"]["totalFlows"], 1);

        for id in ids {
            let payload = rx.try_recv().unwrap();
            let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(json["type"], "new_traffic");
            assert_eq!(json["data"]["flowId"], id.as_str());
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clear_broadcasts_stats_and_keeps_observers() {
        let pipeline = pipeline(10);
        let (tx, mut rx) = mpsc::channel(16);
        let id = pipeline.register_observer(tx).unwrap();
        pipeline.ingest_message(&message("/gps")).unwrap();

        assert_eq!(pipeline.clear(), 1);
        assert!(pipeline.registry().contains(id));

        let kinds: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|p| event_type(&p))
            .collect();
        assert_eq!(kinds, vec!["stats_update", "new_traffic", "stats_update"]);
        assert_eq!(pipeline.stats().total_flows, 0);
    }

    #[test]
    fn test_dead_observer_dropped_on_broadcast() {
        let pipeline = pipeline(10);
        let (live_tx, mut live_rx) = mpsc::channel(16);
        let (dead_tx, dead_rx) = mpsc::channel(16);
        let live = pipeline.register_observer(live_tx).unwrap();
        let dead = pipeline.register_observer(dead_tx).unwrap();
        drop(dead_rx);

        pipeline.ingest_message(&message("/x")).unwrap();

        assert!(pipeline.registry().contains(live));
        assert!(!pipeline.registry().contains(dead));
        assert_eq!(pipeline.metrics().snapshot().observers_dropped, 1);
        assert_eq!(event_type(&live_rx.try_recv().unwrap()), "stats_update");
        assert_eq!(event_type(&live_rx.try_recv().unwrap()), "new_traffic");
    }

    #[test]
    fn test_failed_registration_not_counted() {
        let pipeline = pipeline(10);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        assert_eq!(pipeline.register_observer(tx), None);
        assert!(pipeline.registry().is_empty());
        assert_eq!(pipeline.metrics().snapshot().observers_connected, 0);
    }

    #[test]
    fn test_lagging_observer_resynced_with_stats() {
        let pipeline = pipeline(100);
        let (tx, mut rx) = mpsc::channel(4);
        let id = pipeline.register_observer(tx).unwrap();

        for i in 0..20 {
            pipeline.ingest_message(&message(&format!("/burst/{}", i))).unwrap();
        }
        assert!(pipeline.registry().contains(id));
        assert!(pipeline.registry().is_lagging(id));

        // Nothing to resync while the queue still holds events
        assert!(!pipeline.resync_observer(id));

        let kinds: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|p| event_type(&p))
            .collect();
        assert_eq!(kinds, vec!["stats_update", "new_traffic", "new_traffic", "new_traffic"]);

        assert!(pipeline.resync_observer(id));
        assert!(!pipeline.resync_observer(id));
        let resync: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(resync["type"], "stats_update");
        assert_eq!(resync["data"]["totalFlows"], 20);

        let flow = pipeline.ingest_message(&message("/after")).unwrap();
        let next: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(next["data"]["flowId"], flow.flow_id());

        let metrics = pipeline.metrics().snapshot();
        assert_eq!(metrics.observers_dropped, 0);
        assert_eq!(metrics.observers_resynced, 1);
        assert_eq!(metrics.observer_events_skipped, 17);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_stats_push() {
        let pipeline = Arc::new(pipeline(10));
        let (tx, mut rx) = mpsc::channel(16);
        pipeline.register_observer(tx).unwrap();
        assert_eq!(event_type(&rx.recv().await.unwrap()), "stats_update");

        let task = tokio::spawn(
            StatsBroadcaster::new(pipeline.clone(), Duration::from_secs(5)).start(),
        );
        tokio::time::sleep(Duration::from_secs(11)).await;
        task.abort();

        let kinds: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|p| event_type(&p))
            .collect();
        assert_eq!(kinds, vec!["stats_update", "stats_update"]);
    }

    #[test]
    fn test_broadcast_stats_without_observers_is_noop() {
        let pipeline = pipeline(10);
        assert_eq!(pipeline.broadcast_stats(), BroadcastOutcome::default());
    }

    #[test]
    fn test_ingest_record_directly() {
        let pipeline = pipeline(10);
        let record = TransactionRecord::new(
            TransportKind::Http,
            "POST",
            "www.googletagmanager.com",
            "/gtm.js",
            "200",
        );
        let flow = pipeline.ingest(record, None);
        assert_eq!(flow.leak_kind(), Some(LeakKind::Tracking));
        assert_eq!(pipeline.leaks().len(), 1);
        assert_eq!(pipeline.flows().len(), 1);
    }
}
