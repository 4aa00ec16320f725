//! Bounded, insertion-ordered history of classified flows

use crate::types::event::DashboardStats;
use crate::types::flow::ClassifiedFlow;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// Fixed-capacity flow history. When full, appending evicts the oldest flow.
///
/// All reads happen under the read lock, so a snapshot reflects the state
/// either before or after any append, never in between.
pub struct FlowStore {
    flows: RwLock<VecDeque<Arc<ClassifiedFlow>>>,
    capacity: usize,
}

impl FlowStore {
    /// Create a store holding at most `capacity` flows (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            flows: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a flow, returning the evicted flow if the store was full
    pub fn append(&self, flow: Arc<ClassifiedFlow>) -> Option<Arc<ClassifiedFlow>> {
        let mut flows = self.flows.write();
        flows.push_back(flow);
        if flows.len() > self.capacity {
            flows.pop_front()
        } else {
            None
        }
    }

    /// Copy of all retained flows, oldest first
    pub fn snapshot(&self) -> Vec<Arc<ClassifiedFlow>> {
        self.flows.read().iter().cloned().collect()
    }

    /// Retained flows carrying a leak label, oldest first
    pub fn leaks(&self) -> Vec<Arc<ClassifiedFlow>> {
        self.flows
            .read()
            .iter()
            .filter(|flow| flow.is_leak())
            .cloned()
            .collect()
    }

    /// Derive statistics over the current contents.
    ///
    /// `recent` and `leaks` bound the two lists, both newest first.
    pub fn stats(&self, recent: usize, leaks: usize) -> DashboardStats {
        let flows = self.flows.read();

        let total_leaks = flows.iter().filter(|flow| flow.is_leak()).count();
        let recent_flows = flows
            .iter()
            .rev()
            .take(recent)
            .map(|flow| ClassifiedFlow::clone(flow))
            .collect();
        let privacy_leaks = flows
            .iter()
            .rev()
            .filter(|flow| flow.is_leak())
            .take(leaks)
            .map(|flow| ClassifiedFlow::clone(flow))
            .collect();

        DashboardStats {
            total_flows: flows.len(),
            total_leaks,
            recent_flows,
            privacy_leaks,
        }
    }

    /// Drop every retained flow, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut flows = self.flows.write();
        let dropped = flows.len();
        flows.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.flows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
