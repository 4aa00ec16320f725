//! Classified flows retained by the store and pushed to observers

use crate::types::leak::{Leak, LeakKind};
use crate::types::record::{TransactionRecord, TransportKind};
use serde::{Deserialize, Serialize};

/// A transaction record after classification.
///
/// Immutable once built; the store and observers share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FlowWire", from = "FlowWire")]
pub struct ClassifiedFlow {
    flow_id: String,
    record: TransactionRecord,
    leak: Option<Leak>,
}

impl ClassifiedFlow {
    /// Build a flow. The record body is dropped here: bodies feed the
    /// content rules and are never retained.
    pub fn new(flow_id: String, mut record: TransactionRecord, leak: Option<Leak>) -> Self {
        record.body = None;
        Self {
            flow_id,
            record,
            leak,
        }
    }

    /// Build a flow with a fresh random identifier
    pub fn with_generated_id(record: TransactionRecord, leak: Option<Leak>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), record, leak)
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    pub fn leak(&self) -> Option<&Leak> {
        self.leak.as_ref()
    }

    pub fn leak_kind(&self) -> Option<LeakKind> {
        self.leak.as_ref().map(Leak::kind)
    }

    pub fn leak_detail(&self) -> Option<&str> {
        self.leak.as_ref().map(Leak::detail)
    }

    pub fn is_leak(&self) -> bool {
        self.leak.is_some()
    }
}

/// Serialized form sent to observers and returned by the query API
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowWire {
    timestamp: String,
    flow_id: String,
    #[serde(rename = "type")]
    transport: TransportKind,
    method: String,
    host: String,
    url: String,
    status: String,
    leak_type: Option<LeakKind>,
    leak_detail: Option<String>,
}

impl From<ClassifiedFlow> for FlowWire {
    fn from(flow: ClassifiedFlow) -> Self {
        let (leak_type, leak_detail) = match flow.leak {
            Some(leak) => (Some(leak.kind()), Some(leak.detail().to_string())),
            None => (None, None),
        };
        let record = flow.record;

        Self {
            timestamp: record.timestamp,
            flow_id: flow.flow_id,
            transport: record.transport,
            method: record.method,
            host: record.host,
            url: record.url,
            status: record.status,
            leak_type,
            leak_detail,
        }
    }
}

impl From<FlowWire> for ClassifiedFlow {
    fn from(wire: FlowWire) -> Self {
        // A detail without a kind carries no label and is dropped
        let leak = wire
            .leak_type
            .map(|kind| Leak::new(kind, wire.leak_detail.unwrap_or_default()));

        Self {
            flow_id: wire.flow_id,
            record: TransactionRecord {
                timestamp: wire.timestamp,
                transport: wire.transport,
                method: wire.method,
                host: wire.host,
                url: wire.url,
                status: wire.status,
                body: None,
            },
            leak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransactionRecord {
        TransactionRecord::new(
            TransportKind::Https,
            "GET",
            "api.example.com",
            "/location/update",
            "200",
        )
        .with_timestamp("12:00:00")
    }

    #[test]
    fn test_wire_format_without_leak() {
        let flow = ClassifiedFlow::new("flow_1".to_string(), record(), None);
        let json = serde_json::to_value(&flow).unwrap();

        assert_eq!(json["flowId"], "flow_1");
        assert_eq!(json["type"], "HTTPS");
        assert_eq!(json["url"], "/location/update");
        assert!(json["leakType"].is_null());
        assert!(json["leakDetail"].is_null());
    }

    #[test]
    fn test_wire_format_with_leak() {
        let leak = Leak::new(LeakKind::GpsData, "Location data detected in GET request");
        let flow = ClassifiedFlow::new("flow_2".to_string(), record(), Some(leak));
        let json = serde_json::to_value(&flow).unwrap();

        assert_eq!(json["leakType"], "GPS_DATA");
        assert_eq!(json["leakDetail"], "Location data detected in GET request");
    }

    #[test]
    fn test_body_is_not_retained() {
        let flow = ClassifiedFlow::with_generated_id(record().with_body("secret"), None);
        assert_eq!(flow.record().body, None);
        assert!(!flow.flow_id().is_empty());
    }

    #[test]
    fn test_detail_without_kind_is_dropped() {
        let json = r#"{"timestamp":"t","flowId":"f","type":"HTTP","method":"GET",
            "host":"h","url":"/","status":"200","leakType":null,"leakDetail":"stray"}"#;
        let flow: ClassifiedFlow = serde_json::from_str(json).unwrap();
        assert!(!flow.is_leak());
        assert_eq!(flow.leak_detail(), None);
    }
}
