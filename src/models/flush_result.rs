use std::fmt::{Display, Formatter, Result};

use serde::Serialize;

use crate::models::{message::Message, status::ErrorKind};

/// A message whose delivery failed for the listed receivers.
#[derive(Debug, Clone, Serialize)]
pub struct FailedMessage {
    pub kind: ErrorKind,
    pub receivers: Vec<String>,
    pub message: Message,
    pub provider: String,
}

impl FailedMessage {
    pub fn new(kind: ErrorKind, receivers: Vec<String>, message: Message, provider: &str) -> Self {
        Self {
            kind,
            receivers,
            message,
            provider: provider.to_string(),
        }
    }
}

impl Display for FailedMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "FailedMessage: kind: {} receivers: {:?}",
            self.kind, self.receivers
        )
    }
}

/// The gateway rotated a recipient token; callers must replace `token` with
/// `new_token` in their records.
#[derive(Debug, Clone, Serialize)]
pub struct NewTokenMessage {
    pub token: String,
    pub new_token: String,
    pub message: Message,
    pub provider: String,
}

impl NewTokenMessage {
    pub fn new(token: String, new_token: String, message: Message, provider: &str) -> Self {
        Self {
            token,
            new_token,
            message,
            provider: provider.to_string(),
        }
    }
}

impl Display for NewTokenMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "NewTokenMessage: old token: {} new token: {}",
            self.token, self.new_token
        )
    }
}

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlushResult {
    pub failed_messages: Vec<FailedMessage>,
    pub new_token_messages: Vec<NewTokenMessage>,
}

impl FlushResult {
    pub fn is_clean(&self) -> bool {
        self.failed_messages.is_empty() && self.new_token_messages.is_empty()
    }

    pub fn extend(&mut self, other: FlushResult) {
        self.failed_messages.extend(other.failed_messages);
        self.new_token_messages.extend(other.new_token_messages);
    }
}

impl Display for FlushResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "FlushResult - Failed: {} NewToken: {}",
            self.failed_messages.len(),
            self.new_token_messages.len()
        )
    }
}
