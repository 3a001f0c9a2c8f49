//! Identity gateway client: verified identity claims for invitation
//! acceptance.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Claims asserted by the external identity gateway after proofing.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    /// Stable subject identifier.
    pub sub: String,
    /// Primary verified email address.
    pub email: String,
    /// Other verified addresses on the same identity.
    pub additional_emails: Vec<String>,
    pub given_name: String,
    pub family_name: String,
    pub phone: String,
    /// Provider-gateway identifier derived by the gateway.
    pub pac_id: String,
}

impl VerifiedClaims {
    /// Every verified address, primary first.
    pub fn all_emails(&self) -> Vec<&str> {
        std::iter::once(self.email.as_str())
            .chain(self.additional_emails.iter().map(|s| s.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Error)]
pub enum UserInfoError {
    #[error("identity gateway rejected the access token")]
    Unauthorized,

    #[error("identity gateway error: {0}")]
    Gateway(String),
}

#[async_trait]
pub trait UserInfoService: Send + Sync {
    async fn user_info(&self, access_token: &str) -> Result<VerifiedClaims, UserInfoError>;
}

/// Wire format of the gateway's userinfo endpoint.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: String,
    #[serde(default)]
    all_emails: Vec<String>,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    social_security_number: String,
}

#[derive(Clone)]
pub struct HttpUserInfoService {
    client: reqwest::Client,
    userinfo_url: String,
}

impl HttpUserInfoService {
    pub fn new(config: &crate::config::IdentityGatewayConfig) -> Result<Self, UserInfoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| UserInfoError::Gateway(e.to_string()))?;

        Ok(Self {
            client,
            userinfo_url: config.userinfo_url.clone(),
        })
    }
}

#[async_trait]
impl UserInfoService for HttpUserInfoService {
    #[tracing::instrument(skip_all)]
    async fn user_info(&self, access_token: &str) -> Result<VerifiedClaims, UserInfoError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Userinfo request failed");
                UserInfoError::Gateway(e.to_string())
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UserInfoError::Unauthorized);
        }

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Userinfo request returned an error");
            return Err(UserInfoError::Gateway(format!("status {}", status)));
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| UserInfoError::Gateway(e.to_string()))?;

        let mut additional_emails = info.all_emails;
        additional_emails.retain(|e| !e.eq_ignore_ascii_case(&info.email));

        Ok(VerifiedClaims {
            sub: info.sub,
            email: info.email,
            additional_emails,
            given_name: info.given_name,
            family_name: info.family_name,
            phone: info.phone,
            pac_id: info.social_security_number,
        })
    }
}

/// Programmable double for tests.
pub struct MockUserInfoService {
    response: std::sync::Mutex<Result<VerifiedClaims, UserInfoError>>,
}

impl MockUserInfoService {
    pub fn returning(claims: VerifiedClaims) -> Self {
        Self {
            response: std::sync::Mutex::new(Ok(claims)),
        }
    }

    pub fn failing(error: UserInfoError) -> Self {
        Self {
            response: std::sync::Mutex::new(Err(error)),
        }
    }

    pub fn set_response(&self, response: Result<VerifiedClaims, UserInfoError>) {
        if let Ok(mut guard) = self.response.lock() {
            *guard = response;
        }
    }
}

#[async_trait]
impl UserInfoService for MockUserInfoService {
    async fn user_info(&self, _access_token: &str) -> Result<VerifiedClaims, UserInfoError> {
        self.response
            .lock()
            .map_err(|e| UserInfoError::Gateway(format!("mock mutex poisoned: {}", e)))?
            .clone()
    }
}
