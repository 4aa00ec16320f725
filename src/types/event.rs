//! Messages pushed to observers

use crate::types::flow::ClassifiedFlow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Rolling statistics over the retained flows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Flows currently retained
    pub total_flows: usize,
    /// Retained flows carrying a leak label
    pub total_leaks: usize,
    /// Most recent flows, newest first
    pub recent_flows: Vec<ClassifiedFlow>,
    /// Most recent leak flows, newest first
    pub privacy_leaks: Vec<ClassifiedFlow>,
}

/// Envelope for everything sent over an observer connection
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ObserverEvent<'a> {
    NewTraffic(&'a ClassifiedFlow),
    StatsUpdate(&'a DashboardStats),
}

impl ObserverEvent<'_> {
    /// Serialize once so every observer shares the same payload
    pub fn encode(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}
