pub mod bike;
pub mod ferry;
pub mod subway;

use serde::Serialize;
use serde_json::Value;

/// What a tool hands back to the host: prose for the model to relay, or data.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Json(Value),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Self {
        // Serializing plain data structs to a Value cannot fail
        Reply::Json(serde_json::to_value(value).unwrap_or(Value::Null))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Text(s) => s,
            Reply::Json(v) => serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string()),
        }
    }
}
