use std::mem;

use anyhow::{Error, Result};
use futures_util::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    clients::provider::Provider,
    models::{
        fcm::{FcmRequest, FcmResponse},
        flush_result::{FailedMessage, FlushResult, NewTokenMessage},
        message::Message,
        status::ErrorKind,
    },
};

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Provider for the JSON gateway. One request may address many recipients.
pub struct FcmProvider {
    http_client: Client,
    endpoint: String,
    api_key: String,
    pending: Vec<Message>,
}

impl FcmProvider {
    pub const NAME: &'static str = "fcm";

    pub fn new(api_key: String, endpoint: Option<String>) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_FCM_ENDPOINT.to_string());
        info!(endpoint = %endpoint, "FCM provider initialized");

        Self {
            http_client: Client::new(),
            endpoint,
            api_key,
            pending: Vec::new(),
        }
    }

    async fn deliver(&self, message: Message, result: &mut FlushResult) {
        let request = build_request(&message);

        let response = match self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.api_key))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "FCM request failed");
                let receivers = message.receivers().to_vec();
                result.failed_messages.push(FailedMessage::new(
                    ErrorKind::Transport,
                    receivers,
                    message,
                    Self::NAME,
                ));
                return;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let kind = ErrorKind::from_fcm_status(status.as_u16());
            warn!(status = status.as_u16(), kind = %kind, "FCM rejected request");
            let receivers = message.receivers().to_vec();
            result
                .failed_messages
                .push(FailedMessage::new(kind, receivers, message, Self::NAME));
            return;
        }

        let body = match response.json::<FcmResponse>().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Unparseable FCM response body, ignoring");
                return;
            }
        };

        if body.failure == 0 && body.canonical_ids == 0 {
            debug!(success = body.success, "FCM notification delivered");
            return;
        }

        collect_results(message, body, result);
    }
}

/// Turns per-recipient results into token rotations and one failure per
/// distinct error kind, in the order kinds first appear.
fn collect_results(message: Message, body: FcmResponse, result: &mut FlushResult) {
    let mut errors: Vec<(ErrorKind, Vec<String>)> = Vec::new();

    for (receiver, outcome) in message.receivers().iter().zip(body.results) {
        match (outcome.message_id, outcome.registration_id, outcome.error) {
            (Some(_), Some(new_token), _) => {
                result.new_token_messages.push(NewTokenMessage::new(
                    receiver.clone(),
                    new_token,
                    message.clone(),
                    FcmProvider::NAME,
                ));
            }
            (_, _, Some(error)) => {
                let kind = ErrorKind::from_fcm_error(&error);
                match errors.iter_mut().find(|(k, _)| *k == kind) {
                    Some((_, receivers)) => receivers.push(receiver.clone()),
                    None => errors.push((kind, vec![receiver.clone()])),
                }
            }
            _ => {}
        }
    }

    for (kind, receivers) in errors {
        warn!(kind = %kind, count = receivers.len(), "FCM rejected receivers");
        result.failed_messages.push(FailedMessage::new(
            kind,
            receivers,
            message.clone(),
            FcmProvider::NAME,
        ));
    }
}

fn build_request(message: &Message) -> FcmRequest {
    let mut data = message.payload().clone();
    let notification = match data.remove("notification") {
        Some(Value::Object(notification)) => Some(notification),
        _ => notification_from_aps(message.payload()),
    };

    let receivers = message.receivers();
    let (to, registration_ids) = match receivers {
        [single] => (Some(single.clone()), None),
        many => (None, Some(many.to_vec())),
    };

    FcmRequest {
        to,
        registration_ids,
        data,
        notification,
        time_to_live: message.time_to_live().filter(|ttl| *ttl >= 0),
        collapse_key: message
            .collapse_key()
            .filter(|key| !key.is_empty())
            .map(str::to_string),
    }
}

fn notification_from_aps(payload: &Map<String, Value>) -> Option<Map<String, Value>> {
    let aps = payload.get("aps")?.as_object()?;
    let mut notification = Map::new();

    match aps.get("alert") {
        Some(Value::Object(alert)) => {
            for key in ["title", "body"] {
                if let Some(value) = alert.get(key) {
                    notification.insert(key.to_string(), value.clone());
                }
            }
        }
        Some(Value::String(body)) => {
            notification.insert("body".to_string(), Value::from(body.clone()));
        }
        _ => {}
    }
    if let Some(sound) = aps.get("sound") {
        notification.insert("sound".to_string(), sound.clone());
    }

    (!notification.is_empty()).then_some(notification)
}

impl Provider for FcmProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_multiple_recipients(&self) -> bool {
        true
    }

    fn init(&mut self) {
        self.pending.clear();
    }

    fn send(&mut self, message: Message) {
        self.pending.push(message);
    }

    fn finalize(&mut self) -> BoxFuture<'_, FlushResult> {
        Box::pin(async move {
            let mut result = FlushResult::default();
            for message in mem::take(&mut self.pending) {
                self.deliver(message, &mut result).await;
            }
            result
        })
    }
}
