use std::time::{Duration, Instant};

use anyhow::{Error, Result, anyhow};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use tracing::debug;

/// Produces signed provider tokens for the HTTP/2 gateway.
pub trait TokenSigner: Send + Sync {
    fn sign(&self) -> Result<String, Error>;
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    iat: i64,
}

/// ES256 signer over a `.p8` signing key.
pub struct Es256Signer {
    team_id: String,
    key_id: String,
    key: EncodingKey,
}

impl Es256Signer {
    pub fn from_pem(team_id: String, key_id: String, key_pem: &[u8]) -> Result<Self, Error> {
        let key = EncodingKey::from_ec_pem(key_pem)
            .map_err(|e| anyhow!("Failed to parse signing key {}: {}", key_id, e))?;

        Ok(Self {
            team_id,
            key_id,
            key,
        })
    }
}

impl TokenSigner for Es256Signer {
    fn sign(&self) -> Result<String, Error> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let claims = Claims {
            iss: &self.team_id,
            iat: chrono::Utc::now().timestamp(),
        };

        encode(&header, &claims, &self.key).map_err(|e| anyhow!("Failed to sign provider token: {}", e))
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    issued_at: Instant,
}

/// Bearer token reused across messages and flushes until it is older than
/// the refresh threshold.
#[derive(Debug, Clone)]
pub struct BearerCache {
    refresh_after: Duration,
    cached: Option<CachedToken>,
}

impl BearerCache {
    pub fn new(refresh_after: Duration) -> Self {
        Self {
            refresh_after,
            cached: None,
        }
    }

    /// Returns the cached token, signing a new one through `signer` when none
    /// is cached or the cached one has outlived the threshold at `now`.
    pub fn bearer(&mut self, signer: &dyn TokenSigner, now: Instant) -> Result<&str, Error> {
        let stale = match &self.cached {
            Some(token) => now.saturating_duration_since(token.issued_at) > self.refresh_after,
            None => true,
        };

        if stale {
            let value = signer.sign()?;
            debug!("Provider token regenerated");
            self.cached = Some(CachedToken {
                value,
                issued_at: now,
            });
        }

        match &self.cached {
            Some(token) => Ok(token.value.as_str()),
            None => Err(anyhow!("Provider token unavailable")),
        }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
