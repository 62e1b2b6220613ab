use std::{
    mem,
    time::{Duration, Instant},
};

use anyhow::{Error, Result, anyhow};
use futures_util::future::BoxFuture;
use reqwest::{Client, Identity, StatusCode};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clients::{
        auth::{BearerCache, TokenSigner},
        certificate::extract_first_topic,
        provider::Provider,
    },
    models::{
        apns::{ApnsErrorBody, DEFAULT_EXPIRATION_SECONDS, Environment, Priority},
        flush_result::{FailedMessage, FlushResult},
        message::Message,
        status::ErrorKind,
    },
};

/// Tokens are refreshed well inside the gateway's one hour validity window.
pub const DEFAULT_BEARER_REFRESH: Duration = Duration::from_secs(45 * 60);

enum Credentials {
    Token {
        signer: Box<dyn TokenSigner>,
        cache: BearerCache,
    },
    Certificate,
}

enum Outcome {
    Delivered,
    Failed(ErrorKind),
    ExpiredToken,
    Ignored,
}

/// Provider for the HTTP/2 gateway. Each message is its own request, so one
/// failure never affects the rest of the batch.
pub struct ApnsProvider {
    http_client: Client,
    base_url: String,
    topic: Option<String>,
    credentials: Credentials,
    pending: Vec<Message>,
}

impl ApnsProvider {
    pub const NAME: &'static str = "apns";

    /// Token-based authentication: requests carry a cached bearer token.
    pub fn with_token(
        environment: Environment,
        topic: Option<String>,
        signer: Box<dyn TokenSigner>,
        bearer_refresh: Duration,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP/2 client: {}", e))?;

        info!(?environment, topic = ?topic, "APNs provider initialized with token authentication");

        Ok(Self {
            http_client,
            base_url: environment.api_base_url().to_string(),
            topic,
            credentials: Credentials::Token {
                signer,
                cache: BearerCache::new(bearer_refresh),
            },
            pending: Vec::new(),
        })
    }

    /// Certificate-based authentication. Without an explicit topic, the first
    /// topic embedded in the certificate is used.
    pub fn with_certificate(
        environment: Environment,
        topic: Option<String>,
        certificate_pem: &str,
    ) -> Result<Self, Error> {
        let identity = Identity::from_pem(certificate_pem.as_bytes())
            .map_err(|e| anyhow!("Invalid client certificate: {}", e))?;
        let http_client = Client::builder()
            .identity(identity)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP/2 client: {}", e))?;

        let topic = topic.or_else(|| extract_first_topic(certificate_pem));
        if topic.is_none() {
            warn!("APNs provider has no topic, requests are sent without apns-topic");
        }

        info!(?environment, topic = ?topic, "APNs provider initialized with certificate authentication");

        Ok(Self {
            http_client,
            base_url: environment.api_base_url().to_string(),
            topic,
            credentials: Credentials::Certificate,
            pending: Vec::new(),
        })
    }

    /// Points the provider at a different gateway host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn deliver(&mut self, message: &Message, device_token: &str) -> Option<ErrorKind> {
        let mut refreshed = false;

        loop {
            let outcome = match self.send_once(message, device_token).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(device_token, error = %e, "APNs request failed");
                    return Some(ErrorKind::Transport);
                }
            };

            match outcome {
                Outcome::Delivered | Outcome::Ignored => return None,
                Outcome::Failed(kind) => return Some(kind),
                Outcome::ExpiredToken => {
                    let Credentials::Token { cache, .. } = &mut self.credentials else {
                        return Some(ErrorKind::ExpiredProviderToken);
                    };
                    if refreshed {
                        return Some(ErrorKind::ExpiredProviderToken);
                    }
                    debug!(device_token, "Provider token expired, refreshing once");
                    cache.invalidate();
                    refreshed = true;
                }
            }
        }
    }

    async fn send_once(&mut self, message: &Message, device_token: &str) -> Result<Outcome, Error> {
        let now = chrono::Utc::now().timestamp();
        let expiration = match message.time_to_live() {
            Some(ttl) if ttl <= 0 => 0,
            Some(ttl) => now.saturating_add(ttl),
            None => now.saturating_add(DEFAULT_EXPIRATION_SECONDS),
        };
        let priority = Priority::for_payload(message.payload());
        let identifier = message.identifier().unwrap_or_else(rand::random::<u32>);
        let apns_id = Uuid::from_u64_pair(0, identifier as u64);

        let url = format!("{}/3/device/{}", self.base_url, device_token);
        let mut request = self
            .http_client
            .post(&url)
            .header("apns-expiration", expiration.to_string())
            .header("apns-priority", priority.as_header())
            .header("apns-id", apns_id.to_string())
            .json(message.payload());

        if let Some(topic) = &self.topic {
            request = request.header("apns-topic", topic);
        }
        if let Some(collapse_key) = message.collapse_key() {
            request = request.header("apns-collapse-id", collapse_key);
        }
        if let Credentials::Token { signer, cache } = &mut self.credentials {
            let bearer = match cache.bearer(signer.as_ref(), Instant::now()) {
                Ok(bearer) => bearer,
                Err(e) => {
                    warn!(error = %e, "Unable to sign provider token");
                    return Ok(Outcome::Failed(ErrorKind::MissingProviderToken));
                }
            };
            request = request.header("authorization", format!("bearer {}", bearer));
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            debug!(device_token, "APNs notification delivered");
            return Ok(Outcome::Delivered);
        }

        let body = response.text().await?;
        match serde_json::from_str::<ApnsErrorBody>(&body) {
            Ok(error) => {
                let kind = ErrorKind::from_apns_reason(&error.reason);
                warn!(
                    device_token,
                    status = status.as_u16(),
                    reason = %error.reason,
                    "APNs rejected notification"
                );
                if kind == ErrorKind::ExpiredProviderToken {
                    Ok(Outcome::ExpiredToken)
                } else {
                    Ok(Outcome::Failed(kind))
                }
            }
            Err(e) => {
                warn!(
                    device_token,
                    status = status.as_u16(),
                    error = %e,
                    "Unparseable APNs error body, ignoring"
                );
                Ok(Outcome::Ignored)
            }
        }
    }
}

impl Provider for ApnsProvider {
    fn name(&self) -> &str {
        Self::NAME
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
                let Some(device_token) = message.receivers().first().cloned() else {
                    result.failed_messages.push(FailedMessage::new(
                        ErrorKind::MissingDeviceToken,
                        Vec::new(),
                        message,
                        Self::NAME,
                    ));
                    continue;
                };

                if let Some(kind) = self.deliver(&message, &device_token).await {
                    result.failed_messages.push(FailedMessage::new(
                        kind,
                        vec![device_token],
                        message,
                        Self::NAME,
                    ));
                }
            }

            result
        })
    }
}
