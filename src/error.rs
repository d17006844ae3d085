use serde_json::{json, Value};

/// Failures at the boundary with upstream feeds and static data lookups.
///
/// None of these abort a tool call on their own: callers either degrade (drop
/// real-time data) or turn the error into a structured result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitError {
    #[error("Request timed out")]
    NetworkTimeout,
    #[error("HTTP error: {status}")]
    UpstreamHttp { status: u16 },
    #[error("Failed to parse feed data: {0}")]
    ParseFailure(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NoDataAvailable(String),
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransitError {
    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl From<reqwest::Error> for TransitError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransitError::NetworkTimeout
        } else if let Some(status) = e.status() {
            TransitError::UpstreamHttp {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            TransitError::ParseFailure(e.to_string())
        } else {
            TransitError::Request(e.to_string())
        }
    }
}

impl From<prost::DecodeError> for TransitError {
    fn from(e: prost::DecodeError) -> Self {
        TransitError::ParseFailure(e.to_string())
    }
}
