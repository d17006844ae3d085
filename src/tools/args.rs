//! Tool arguments as hosts actually send them: numbers, numeric strings, and
//! strings wrapped in an extra pair of quotes.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::tools::ToolError;

pub struct Args<'a> {
    values: &'a Map<String, Value>,
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"').trim()
}

impl<'a> Args<'a> {
    pub fn new(values: &'a Map<String, Value>) -> Self {
        Self { values }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    fn invalid(name: &str, reason: impl Into<String>) -> ToolError {
        ToolError::InvalidArgument {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }

    fn missing(name: &str) -> ToolError {
        Self::invalid(name, "missing")
    }

    pub fn opt_number(&self, name: &str) -> Result<Option<f64>, ToolError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };

        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => unquote(s).parse::<f64>().ok(),
            _ => None,
        };

        match n {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(Self::invalid(name, format!("expected a number, got {value}"))),
        }
    }

    pub fn number(&self, name: &str) -> Result<f64, ToolError> {
        self.opt_number(name)?.ok_or_else(|| Self::missing(name))
    }

    pub fn number_or(&self, name: &str, default: f64) -> Result<f64, ToolError> {
        Ok(self.opt_number(name)?.unwrap_or(default))
    }

    /// Non-negative whole number; a float argument is truncated.
    pub fn count_or(&self, name: &str, default: usize) -> Result<usize, ToolError> {
        let Some(value) = self.get(name) else {
            return Ok(default);
        };

        let n = match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => unquote(s).parse::<u64>().ok(),
            _ => None,
        };

        n.and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Self::invalid(name, format!("expected a non-negative integer, got {value}"))
            })
    }

    pub fn text(&self, name: &str) -> Result<&'a str, ToolError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(unquote(s)),
            Some(other) => Err(Self::invalid(name, format!("expected a string, got {other}"))),
            None => Err(Self::missing(name)),
        }
    }

    /// An identifier sent either as a JSON number or as a string.
    pub fn id(&self, name: &str) -> Result<Cow<'a, str>, ToolError> {
        match self.get(name) {
            Some(Value::Number(n)) => Ok(Cow::Owned(match n.as_i64() {
                Some(i) => i.to_string(),
                None => n.to_string(),
            })),
            Some(_) => self.text(name).map(Cow::Borrowed),
            None => Err(Self::missing(name)),
        }
    }
}
