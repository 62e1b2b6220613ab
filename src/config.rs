use std::{fs, time::Duration};

use anyhow::{Context, Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;
use tracing::info;

use crate::{
    clients::{
        apns::{ApnsProvider, DEFAULT_BEARER_REFRESH},
        auth::Es256Signer, connector::TlsGatewayConnector, fcm::FcmProvider,
        legacy::LegacyApnsProvider,
    },
    dispatcher::Dispatcher,
    models::{apns::Environment, retry::RetryConfig},
};

pub const APNS_HANDLE: &str = "apns";
pub const APNS_LEGACY_HANDLE: &str = "apns-legacy";
pub const FCM_HANDLE: &str = "fcm";

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub apns_environment: Environment,
    pub apns_topic: Option<String>,

    pub apns_team_id: Option<String>,
    pub apns_key_id: Option<String>,
    pub apns_key_path: Option<String>,
    pub apns_certificate_path: Option<String>,

    pub apns_legacy_certificate_path: Option<String>,

    pub fcm_api_key: Option<String>,
    pub fcm_endpoint: Option<String>,

    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default = "default_bearer_refresh_seconds")]
    pub bearer_refresh_seconds: u64,

    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,
}

fn default_reply_timeout_ms() -> u64 {
    2000
}

fn default_bearer_refresh_seconds() -> u64 {
    DEFAULT_BEARER_REFRESH.as_secs()
}

fn default_max_connect_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    2000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from_config(self)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn bearer_refresh(&self) -> Duration {
        Duration::from_secs(self.bearer_refresh_seconds)
    }

    /// Registers one provider per configured gateway.
    pub fn build_dispatcher(&self) -> Result<Dispatcher, Error> {
        let mut dispatcher = Dispatcher::new();

        if let Some(provider) = self.apns_provider()? {
            dispatcher.register(APNS_HANDLE, Box::new(provider));
        }

        if let Some(path) = &self.apns_legacy_certificate_path {
            let pem = fs::read_to_string(path)
                .with_context(|| format!("Failed to read legacy certificate {}", path))?;
            let connector =
                TlsGatewayConnector::new(self.apns_environment, &pem, self.retry_config())?;
            dispatcher.register(
                APNS_LEGACY_HANDLE,
                Box::new(LegacyApnsProvider::new(connector, self.reply_timeout())),
            );
        }

        if let Some(api_key) = &self.fcm_api_key {
            dispatcher.register(
                FCM_HANDLE,
                Box::new(FcmProvider::new(api_key.clone(), self.fcm_endpoint.clone())),
            );
        }

        info!(environment = ?self.apns_environment, "Dispatcher configured");
        Ok(dispatcher)
    }

    fn apns_provider(&self) -> Result<Option<ApnsProvider>, Error> {
        let token_credentials = (&self.apns_team_id, &self.apns_key_id, &self.apns_key_path);

        match (token_credentials, &self.apns_certificate_path) {
            ((Some(team_id), Some(key_id), Some(key_path)), None) => {
                let key = fs::read(key_path)
                    .with_context(|| format!("Failed to read signing key {}", key_path))?;
                let signer = Es256Signer::from_pem(team_id.clone(), key_id.clone(), &key)?;
                let provider = ApnsProvider::with_token(
                    self.apns_environment,
                    self.apns_topic.clone(),
                    Box::new(signer),
                    self.bearer_refresh(),
                )?;
                Ok(Some(provider))
            }
            ((None, None, None), Some(path)) => {
                let pem = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read certificate {}", path))?;
                let provider =
                    ApnsProvider::with_certificate(self.apns_environment, self.apns_topic.clone(), &pem)?;
                Ok(Some(provider))
            }
            ((None, None, None), None) => Ok(None),
            _ => Err(anyhow!(
                "Supply either a certificate or a team id, key id and signing key for APNs, not both"
            )),
        }
    }
}
