//! OAuth2 client-credentials broker for the external identity gateway.
//!
//! Fetches a bearer token once, caches it, and refreshes shortly before
//! the gateway-reported expiry.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Assumed lifetime when the grant response omits `expires_in`.
const DEFAULT_LIFETIME_SECONDS: u64 = 300;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("token endpoint request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("token endpoint returned an unusable grant: {0}")]
    Grant(String),
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// One outstanding token per broker instance; concurrent refreshes are
/// serialized behind the cache mutex.
pub struct TokenBroker {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenBroker {
    pub fn new(config: &crate::config::IdentityGatewayConfig) -> Result<Self, BrokerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: Mutex::new(None),
        })
    }

    /// Current bearer token, fetching or refreshing as needed.
    #[tracing::instrument(skip_all)]
    pub async fn get_token(&self) -> Result<String, BrokerError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.refresh_at {
                return Ok(entry.token.clone());
            }
        }

        let grant = self.fetch_token().await?;

        let lifetime = Duration::from_secs(grant.expires_in.unwrap_or(DEFAULT_LIFETIME_SECONDS));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);

        tracing::info!(lifetime_seconds = lifetime.as_secs(), "Obtained gateway token");

        let token = grant.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at,
        });

        Ok(token)
    }

    async fn fetch_token(&self) -> Result<TokenGrant, BrokerError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Token endpoint request failed");
                BrokerError::Request(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Token endpoint returned an error");
            return Err(BrokerError::Status(status));
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| BrokerError::Grant(e.to_string()))?;

        if grant.access_token.is_empty() {
            return Err(BrokerError::Grant("empty access_token".to_string()));
        }

        Ok(grant)
    }
}
