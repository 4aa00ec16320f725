//! Privacy Leak Monitor Library
//!
//! Receives network transaction records from an upstream producer over
//! WebSocket, labels privacy-sensitive traffic with an ordered rule chain,
//! keeps the most recent flows in a bounded store and pushes every flow and
//! periodic statistics to connected dashboard observers.

pub mod classifier;
pub mod config;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod store;
pub mod types;

pub use classifier::{classify, Classifier};
pub use config::AppConfig;
pub use error::IngestError;
pub use pipeline::{Pipeline, StatsBroadcaster, StatsLimits};
pub use registry::ObserverRegistry;
pub use store::FlowStore;
pub use types::{ClassifiedFlow, DashboardStats, Leak, LeakKind, TransactionRecord, TransportKind};
