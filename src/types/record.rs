//! Transaction records as emitted by the traffic-capture process

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Transport the intercepted request used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportKind {
    Http,
    Https,
}

impl TransportKind {
    /// Parse a transport name, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("http") {
            Some(TransportKind::Http)
        } else if value.eq_ignore_ascii_case("https") {
            Some(TransportKind::Https)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "HTTP",
            TransportKind::Https => "HTTPS",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed request/response transaction observed upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Producer-local time, not guaranteed monotonic
    pub timestamp: String,

    /// HTTP or HTTPS
    pub transport: TransportKind,

    /// Request method (GET, POST, ...)
    pub method: String,

    /// Request host
    pub host: String,

    /// Request path or full URL
    pub url: String,

    /// Response status code as a string, "0" if unavailable
    pub status: String,

    /// Request body text, only used for content rules and never retained
    pub body: Option<String>,
}

impl TransactionRecord {
    /// Create a record with the required fields and no body
    pub fn new(
        transport: TransportKind,
        method: &str,
        host: &str,
        url: &str,
        status: &str,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().format("%H:%M:%S").to_string(),
            transport,
            method: method.to_string(),
            host: host.to_string(),
            url: url.to_string(),
            status: status.to_string(),
            body: None,
        }
    }

    /// Attach a request body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the producer timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

/// Wire shape accepted from producers; every field optional so that missing
/// fields can be reported by name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundRecord {
    timestamp: Option<String>,
    flow_id: Option<String>,
    #[serde(rename = "type")]
    transport: Option<String>,
    method: Option<String>,
    host: Option<String>,
    url: Option<String>,
    status: Option<Value>,
    body: Option<String>,
}

/// A validated producer message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Producer-assigned identifier, if any
    pub flow_id: Option<String>,
    pub record: TransactionRecord,
}

impl InboundMessage {
    /// Parse and validate one producer message.
    ///
    /// `leakType` and `leakDetail` are ignored: classification is always
    /// done server-side.
    pub fn parse(text: &str) -> Result<Self, IngestError> {
        let raw: InboundRecord = serde_json::from_str(text)?;

        let timestamp = required(raw.timestamp, "timestamp")?;
        let transport_name = required(raw.transport, "type")?;
        let transport =
            TransportKind::parse(&transport_name).ok_or_else(|| IngestError::InvalidField {
                field: "type",
                value: transport_name,
            })?;
        let method = required(raw.method, "method")?;
        let host = required(raw.host, "host")?;
        let url = required(raw.url, "url")?;
        let status = match required(raw.status, "status")? {
            Value::String(status) => status,
            Value::Number(code) => code.to_string(),
            other => {
                return Err(IngestError::InvalidField {
                    field: "status",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            flow_id: raw.flow_id.filter(|id| !id.trim().is_empty()),
            record: TransactionRecord {
                timestamp,
                transport,
                method,
                host,
                url,
                status,
                body: raw.body,
            },
        })
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, IngestError> {
    value.ok_or(IngestError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "timestamp": "12:00:00",
        "flowId": "flow_1",
        "type": "HTTPS",
        "method": "GET",
        "host": "api.example.com",
        "url": "/location/update",
        "status": "200",
        "leakType": "TRACKING",
        "leakDetail": "ignored"
    }"#;

    #[test]
    fn test_parse_full_message() {
        let message = InboundMessage::parse(FULL).unwrap();
        assert_eq!(message.flow_id.as_deref(), Some("flow_1"));
        assert_eq!(message.record.transport, TransportKind::Https);
        assert_eq!(message.record.host, "api.example.com");
        assert_eq!(message.record.status, "200");
        assert_eq!(message.record.body, None);
    }

    #[test]
    fn test_missing_field_is_named() {
        let text = r#"{"timestamp":"12:00:00","type":"HTTP","method":"GET","url":"/","status":"200"}"#;
        match InboundMessage::parse(text) {
            Err(IngestError::MissingField(field)) => assert_eq!(field, "host"),
            other => panic!("expected missing host, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_status_is_normalised() {
        let text = r#"{"timestamp":"t","type":"http","method":"POST","host":"h","url":"/","status":404}"#;
        let message = InboundMessage::parse(text).unwrap();
        assert_eq!(message.record.status, "404");
        assert_eq!(message.record.transport, TransportKind::Http);
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let text = r#"{"timestamp":"t","type":"FTP","method":"GET","host":"h","url":"/","status":"0"}"#;
        assert!(matches!(
            InboundMessage::parse(text),
            Err(IngestError::InvalidField { field: "type", .. })
        ));
    }

    #[test]
    fn test_blank_flow_id_treated_as_absent() {
        let text = r#"{"timestamp":"t","flowId":" ","type":"HTTP","method":"GET","host":"h","url":"/","status":"0"}"#;
        assert_eq!(InboundMessage::parse(text).unwrap().flow_id, None);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            InboundMessage::parse("not json"),
            Err(IngestError::Malformed(_))
        ));
        assert!(matches!(
            InboundMessage::parse("[1, 2]"),
            Err(IngestError::Malformed(_))
        ));
    }
}
