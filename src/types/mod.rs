//! Type definitions for the privacy leak monitor

pub mod event;
pub mod flow;
pub mod leak;
pub mod record;

pub use event::{DashboardStats, ObserverEvent};
pub use flow::ClassifiedFlow;
pub use leak::{Leak, LeakKind};
pub use record::{InboundMessage, TransactionRecord, TransportKind};
