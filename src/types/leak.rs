//! Privacy leak labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of privacy-sensitive data a flow appears to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeakKind {
    /// Location or coordinates
    GpsData,
    /// Hardware or platform identifiers
    DeviceInfo,
    /// Contact details and other personal information
    PersonalData,
    /// Request to a known third-party tracker
    Tracking,
}

impl LeakKind {
    pub const ALL: [LeakKind; 4] = [
        LeakKind::GpsData,
        LeakKind::DeviceInfo,
        LeakKind::PersonalData,
        LeakKind::Tracking,
    ];

    /// Wire name, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            LeakKind::GpsData => "GPS_DATA",
            LeakKind::DeviceInfo => "DEVICE_INFO",
            LeakKind::PersonalData => "PERSONAL_DATA",
            LeakKind::Tracking => "TRACKING",
        }
    }

    /// Human-readable label, used when no better detail is available
    pub fn label(&self) -> &'static str {
        match self {
            LeakKind::GpsData => "Location data detected",
            LeakKind::DeviceInfo => "Device identifier detected",
            LeakKind::PersonalData => "Personal information detected",
            LeakKind::Tracking => "Third-party tracking detected",
        }
    }
}

impl fmt::Display for LeakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leak label together with its detail text.
///
/// Kind and detail only ever travel together, so a flow either carries both
/// or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leak {
    kind: LeakKind,
    detail: String,
}

impl Leak {
    /// Create a leak label. An empty detail falls back to the kind's label.
    pub fn new(kind: LeakKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            kind.label().to_string()
        } else {
            detail
        };
        Self { kind, detail }
    }

    pub fn kind(&self) -> LeakKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}
