use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key binding a message to the provider responsible for delivering it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Handle {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Handle {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.0)
    }
}

/// A single notification addressed to one or more recipient tokens.
///
/// Messages are built by the caller, enriched through the payload mutators and
/// consumed exactly once by a provider during a flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    handle: Handle,
    receivers: Vec<String>,
    payload: Map<String, Value>,
    identifier: Option<u32>,
    time_to_live: Option<i64>,
    collapse_key: Option<String>,
}

impl Message {
    /// Creates a message for `handle`. Duplicate receivers are dropped, keeping
    /// the first occurrence.
    pub fn new<I, S>(handle: impl Into<Handle>, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for receiver in receivers {
            let receiver = receiver.into();
            if !unique.contains(&receiver) {
                unique.push(receiver);
            }
        }

        Self {
            handle: handle.into(),
            receivers: unique,
            payload: Map::new(),
            identifier: None,
            time_to_live: None,
            collapse_key: None,
        }
    }

    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_time_to_live(mut self, seconds: i64) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    pub fn with_collapse_key(mut self, collapse_key: impl Into<String>) -> Self {
        self.collapse_key = Some(collapse_key.into());
        self
    }

    /// Merges `payload` into the message payload. Existing top-level keys are
    /// overwritten.
    pub fn attach(mut self, payload: Map<String, Value>) -> Self {
        self.payload.extend(payload);
        self
    }

    /// Builds an `aps` dictionary from `alert` and merges it into the payload.
    pub fn simple(self, alert: Alert) -> Self {
        let mut aps = Map::new();

        if alert.title.is_some() || alert.subtitle.is_some() || alert.body.is_some() {
            let mut body = Map::new();
            if let Some(title) = alert.title {
                body.insert("title".to_string(), Value::from(title));
            }
            if let Some(subtitle) = alert.subtitle {
                body.insert("subtitle".to_string(), Value::from(subtitle));
            }
            if let Some(text) = alert.body {
                body.insert("body".to_string(), Value::from(text));
            }
            aps.insert("alert".to_string(), Value::Object(body));
        }
        if let Some(sound) = alert.sound {
            aps.insert("sound".to_string(), Value::from(sound));
        }
        if let Some(badge) = alert.badge {
            aps.insert("badge".to_string(), Value::from(badge));
        }
        if let Some(category) = alert.category {
            aps.insert("category".to_string(), Value::from(category));
        }
        if alert.mutable_content {
            aps.insert("mutable-content".to_string(), Value::from(1));
        }
        if alert.content_available {
            aps.insert("content-available".to_string(), Value::from(1));
        }

        let mut payload = Map::new();
        payload.insert("aps".to_string(), Value::Object(aps));
        self.attach(payload)
    }

    /// Converts a multi-recipient message into one single-recipient clone per
    /// receiver. Clones share identifier, ttl, collapse key and a copy of the
    /// payload.
    pub fn split(&self) -> Vec<Message> {
        self.receivers
            .iter()
            .map(|receiver| Message {
                receivers: vec![receiver.clone()],
                ..self.clone()
            })
            .collect()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn receivers(&self) -> &[String] {
        &self.receivers
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn identifier(&self) -> Option<u32> {
        self.identifier
    }

    pub fn time_to_live(&self) -> Option<i64> {
        self.time_to_live
    }

    pub fn collapse_key(&self) -> Option<&str> {
        self.collapse_key.as_deref()
    }

    pub(crate) fn assign_identifier(&mut self, identifier: u32) {
        self.identifier = Some(identifier);
    }
}

/// Common alert fields accepted by [`Message::simple`].
#[derive(Debug, Clone, Default)]
pub struct Alert {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub sound: Option<String>,
    pub badge: Option<u32>,
    pub category: Option<String>,
    pub mutable_content: bool,
    pub content_available: bool,
}

/// Wire shape of a notification request read by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub handle: Handle,
    pub receivers: Vec<String>,

    #[serde(default)]
    pub payload: Map<String, Value>,

    #[serde(default)]
    pub identifier: Option<u32>,

    #[serde(default)]
    pub time_to_live: Option<i64>,

    #[serde(default)]
    pub collapse_key: Option<String>,
}

impl From<NotificationRequest> for Message {
    fn from(request: NotificationRequest) -> Self {
        let mut message = Message::new(request.handle, request.receivers).attach(request.payload);
        message.identifier = request.identifier;
        message.time_to_live = request.time_to_live;
        message.collapse_key = request.collapse_key;
        message
    }
}
