//! Ingestion error taxonomy

/// Reasons a producer message is dropped.
///
/// None of these end the producer connection: the message is logged,
/// counted and skipped.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Not a JSON object of the expected shape
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Binary frame that is not UTF-8 text
    #[error("message is not valid UTF-8")]
    NotUtf8,

    /// A required field is absent or null
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field has an unusable value
    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl IngestError {
    /// True when the message could not be decoded at all, as opposed to
    /// decoding but failing validation
    pub fn is_malformed(&self) -> bool {
        matches!(self, IngestError::Malformed(_) | IngestError::NotUtf8)
    }
}
