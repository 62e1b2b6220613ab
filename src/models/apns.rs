use serde::Deserialize;
use serde_json::{Map, Value};

/// 14 days, used when a message carries no ttl.
pub const DEFAULT_EXPIRATION_SECONDS: i64 = 14 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.push.apple.com",
            Environment::Sandbox => "https://api.sandbox.push.apple.com",
        }
    }

    pub fn legacy_gateway(&self) -> (&'static str, u16) {
        match self {
            Environment::Production => ("gateway.push.apple.com", 2195),
            Environment::Sandbox => ("gateway.sandbox.push.apple.com", 2195),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

impl Priority {
    /// Background pushes (`content-available` set with no alert, sound or
    /// badge) go out at low priority; everything else is high.
    pub fn for_payload(payload: &Map<String, Value>) -> Self {
        let Some(aps) = payload.get("aps").and_then(Value::as_object) else {
            return Priority::High;
        };

        let content_available = match aps.get("content-available") {
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => s.trim().parse::<i64>().is_ok_and(|v| v != 0),
            Some(Value::Bool(b)) => *b,
            _ => false,
        };
        let has_content = ["alert", "sound", "badge"]
            .iter()
            .any(|key| aps.get(*key).is_some_and(|v| !v.is_null()));

        if content_available && !has_content {
            Priority::Low
        } else {
            Priority::High
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Priority::High => 0x0A,
            Priority::Low => 0x05,
        }
    }

    pub fn as_header(&self) -> &'static str {
        match self {
            Priority::High => "10",
            Priority::Low => "5",
        }
    }
}

/// Error body returned by the HTTP/2 gateway on non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsErrorBody {
    pub reason: String,

    #[serde(default)]
    pub timestamp: Option<i64>,
}
