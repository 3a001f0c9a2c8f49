//! Organization API client: the narrow boundary to the external service
//! that actually holds organizations and their credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::token_broker::TokenBroker;

// ==================== Request/response types ====================

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub npi: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationCreated {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicKeyParams {
    pub label: String,
    pub public_key: String,
    pub snippet_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientTokenParams {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTokenEntry {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Token material; only present in the creation response.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IpAddressParams {
    pub label: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddressEntry {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub ip_address: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EntityList<T> {
    #[serde(default = "Vec::new")]
    entities: Vec<T>,
}

// ==================== Failure envelope ====================

/// Uniform failure envelope for non-2xx responses and connection errors.
#[derive(Debug, Clone)]
pub struct OrgApiFailure {
    pub status: u16,
    pub issues: Vec<String>,
}

impl std::fmt::Display for OrgApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}: {}", self.status, self.issues.join("; "))
    }
}

/// Wire format of the API's error body.
#[derive(Debug, Deserialize)]
struct IssueBody {
    #[serde(default)]
    issue: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    #[serde(default)]
    details: IssueDetails,
}

#[derive(Debug, Default, Deserialize)]
struct IssueDetails {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Error)]
pub enum OrgApiError {
    #[error("organization API failure: {0}")]
    Api(OrgApiFailure),

    #[error("organization API unreachable: {0}")]
    Connection(String),

    #[error("authorization failed: {0}")]
    Auth(#[from] super::token_broker::BrokerError),
}

impl OrgApiError {
    fn connection(e: reqwest::Error) -> Self {
        OrgApiError::Connection(e.to_string())
    }
}

// ==================== Trait ====================

#[async_trait]
pub trait OrganizationClient: Send + Sync {
    async fn create_organization(
        &self,
        request: &CreateOrganizationRequest,
    ) -> Result<OrganizationCreated, OrgApiError>;

    async fn create_public_key(
        &self,
        org_api_id: &str,
        params: &PublicKeyParams,
    ) -> Result<PublicKeyEntry, OrgApiError>;
    async fn get_public_keys(&self, org_api_id: &str) -> Result<Vec<PublicKeyEntry>, OrgApiError>;
    async fn delete_public_key(&self, org_api_id: &str, key_id: &str) -> Result<(), OrgApiError>;

    async fn create_client_token(
        &self,
        org_api_id: &str,
        params: &ClientTokenParams,
    ) -> Result<ClientTokenEntry, OrgApiError>;
    async fn get_client_tokens(
        &self,
        org_api_id: &str,
    ) -> Result<Vec<ClientTokenEntry>, OrgApiError>;
    async fn delete_client_token(
        &self,
        org_api_id: &str,
        token_id: &str,
    ) -> Result<(), OrgApiError>;

    async fn create_ip_address(
        &self,
        org_api_id: &str,
        params: &IpAddressParams,
    ) -> Result<IpAddressEntry, OrgApiError>;
    async fn get_ip_addresses(&self, org_api_id: &str)
        -> Result<Vec<IpAddressEntry>, OrgApiError>;
    async fn delete_ip_address(&self, org_api_id: &str, addr_id: &str) -> Result<(), OrgApiError>;
}

// ==================== HTTP implementation ====================

pub struct HttpOrganizationClient {
    client: reqwest::Client,
    base_url: String,
    broker: Arc<TokenBroker>,
}

impl HttpOrganizationClient {
    pub fn new(
        config: &crate::config::OrgApiConfig,
        broker: Arc<TokenBroker>,
    ) -> Result<Self, OrgApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(OrgApiError::connection)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            broker,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into the uniform failure envelope.
    async fn failure(response: reqwest::Response) -> OrgApiError {
        let status = response.status().as_u16();
        let issues = match response.json::<IssueBody>().await {
            Ok(body) => body
                .issue
                .into_iter()
                .map(|i| i.details.text)
                .filter(|t| !t.is_empty())
                .collect(),
            Err(_) => Vec::new(),
        };

        OrgApiError::Api(OrgApiFailure { status, issues })
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, OrgApiError> {
        let token = self.broker.get_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(OrgApiError::connection)?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        response.json().await.map_err(OrgApiError::connection)
    }

    async fn send_no_content(&self, request: reqwest::RequestBuilder) -> Result<(), OrgApiError> {
        let token = self.broker.get_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(OrgApiError::connection)?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        Ok(())
    }
}

#[async_trait]
impl OrganizationClient for HttpOrganizationClient {
    #[tracing::instrument(skip_all, fields(npi = %request.npi))]
    async fn create_organization(
        &self,
        request: &CreateOrganizationRequest,
    ) -> Result<OrganizationCreated, OrgApiError> {
        self.send_json(self.client.post(self.url("/Organization")).json(request))
            .await
    }

    #[tracing::instrument(skip_all, fields(org = %org_api_id))]
    async fn create_public_key(
        &self,
        org_api_id: &str,
        params: &PublicKeyParams,
    ) -> Result<PublicKeyEntry, OrgApiError> {
        self.send_json(
            self.client
                .post(self.url(&format!("/Organization/{}/public_keys", org_api_id)))
                .json(params),
        )
        .await
    }

    async fn get_public_keys(&self, org_api_id: &str) -> Result<Vec<PublicKeyEntry>, OrgApiError> {
        let list: EntityList<PublicKeyEntry> = self
            .send_json(
                self.client
                    .get(self.url(&format!("/Organization/{}/public_keys", org_api_id))),
            )
            .await?;
        Ok(list.entities)
    }

    async fn delete_public_key(&self, org_api_id: &str, key_id: &str) -> Result<(), OrgApiError> {
        self.send_no_content(self.client.delete(self.url(&format!(
            "/Organization/{}/public_keys/{}",
            org_api_id, key_id
        ))))
        .await
    }

    #[tracing::instrument(skip_all, fields(org = %org_api_id))]
    async fn create_client_token(
        &self,
        org_api_id: &str,
        params: &ClientTokenParams,
    ) -> Result<ClientTokenEntry, OrgApiError> {
        self.send_json(
            self.client
                .post(self.url(&format!("/Organization/{}/token", org_api_id)))
                .json(params),
        )
        .await
    }

    async fn get_client_tokens(
        &self,
        org_api_id: &str,
    ) -> Result<Vec<ClientTokenEntry>, OrgApiError> {
        let list: EntityList<ClientTokenEntry> = self
            .send_json(
                self.client
                    .get(self.url(&format!("/Organization/{}/token", org_api_id))),
            )
            .await?;
        Ok(list.entities)
    }

    async fn delete_client_token(
        &self,
        org_api_id: &str,
        token_id: &str,
    ) -> Result<(), OrgApiError> {
        self.send_no_content(self.client.delete(self.url(&format!(
            "/Organization/{}/token/{}",
            org_api_id, token_id
        ))))
        .await
    }

    #[tracing::instrument(skip_all, fields(org = %org_api_id))]
    async fn create_ip_address(
        &self,
        org_api_id: &str,
        params: &IpAddressParams,
    ) -> Result<IpAddressEntry, OrgApiError> {
        self.send_json(
            self.client
                .post(self.url(&format!("/Organization/{}/ip_address", org_api_id)))
                .json(params),
        )
        .await
    }

    async fn get_ip_addresses(
        &self,
        org_api_id: &str,
    ) -> Result<Vec<IpAddressEntry>, OrgApiError> {
        let list: EntityList<IpAddressEntry> = self
            .send_json(
                self.client
                    .get(self.url(&format!("/Organization/{}/ip_address", org_api_id))),
            )
            .await?;
        Ok(list.entities)
    }

    async fn delete_ip_address(&self, org_api_id: &str, addr_id: &str) -> Result<(), OrgApiError> {
        self.send_no_content(self.client.delete(self.url(&format!(
            "/Organization/{}/ip_address/{}",
            org_api_id, addr_id
        ))))
        .await
    }
}

// ==================== Mock implementation ====================

#[derive(Default)]
struct MockCounters {
    create_organization: usize,
    create_public_key: usize,
    create_client_token: usize,
    create_ip_address: usize,
    deletes: usize,
}

/// Programmable double with call counting.
#[derive(Default)]
pub struct MockOrganizationClient {
    counters: std::sync::Mutex<MockCounters>,
    fail_with: std::sync::Mutex<Option<OrgApiFailure>>,
}

impl MockOrganizationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with the given envelope.
    pub fn fail_with(&self, failure: OrgApiFailure) {
        if let Ok(mut guard) = self.fail_with.lock() {
            *guard = Some(failure);
        }
    }

    pub fn create_public_key_calls(&self) -> usize {
        self.counters.lock().map(|c| c.create_public_key).unwrap_or(0)
    }

    pub fn create_client_token_calls(&self) -> usize {
        self.counters
            .lock()
            .map(|c| c.create_client_token)
            .unwrap_or(0)
    }

    pub fn create_ip_address_calls(&self) -> usize {
        self.counters.lock().map(|c| c.create_ip_address).unwrap_or(0)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.lock().map(|c| c.deletes).unwrap_or(0)
    }

    fn check_failure(&self) -> Result<(), OrgApiError> {
        match self.fail_with.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(failure) => Err(OrgApiError::Api(failure.clone())),
                None => Ok(()),
            },
            Err(e) => Err(OrgApiError::Connection(format!("mock mutex poisoned: {}", e))),
        }
    }

    fn count(&self, f: impl FnOnce(&mut MockCounters)) {
        if let Ok(mut guard) = self.counters.lock() {
            f(&mut guard);
        }
    }
}

#[async_trait]
impl OrganizationClient for MockOrganizationClient {
    async fn create_organization(
        &self,
        _request: &CreateOrganizationRequest,
    ) -> Result<OrganizationCreated, OrgApiError> {
        self.count(|c| c.create_organization += 1);
        self.check_failure()?;
        Ok(OrganizationCreated {
            id: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn create_public_key(
        &self,
        _org_api_id: &str,
        params: &PublicKeyParams,
    ) -> Result<PublicKeyEntry, OrgApiError> {
        self.count(|c| c.create_public_key += 1);
        self.check_failure()?;
        Ok(PublicKeyEntry {
            id: uuid::Uuid::new_v4().to_string(),
            label: params.label.clone(),
            created_at: None,
        })
    }

    async fn get_public_keys(&self, _org_api_id: &str) -> Result<Vec<PublicKeyEntry>, OrgApiError> {
        self.check_failure()?;
        Ok(Vec::new())
    }

    async fn delete_public_key(&self, _org_api_id: &str, _key_id: &str) -> Result<(), OrgApiError> {
        self.count(|c| c.deletes += 1);
        self.check_failure()
    }

    async fn create_client_token(
        &self,
        _org_api_id: &str,
        params: &ClientTokenParams,
    ) -> Result<ClientTokenEntry, OrgApiError> {
        self.count(|c| c.create_client_token += 1);
        self.check_failure()?;
        Ok(ClientTokenEntry {
            id: uuid::Uuid::new_v4().to_string(),
            label: params.label.clone(),
            token: Some(format!("token-{}", uuid::Uuid::new_v4())),
            created_at: None,
        })
    }

    async fn get_client_tokens(
        &self,
        _org_api_id: &str,
    ) -> Result<Vec<ClientTokenEntry>, OrgApiError> {
        self.check_failure()?;
        Ok(Vec::new())
    }

    async fn delete_client_token(
        &self,
        _org_api_id: &str,
        _token_id: &str,
    ) -> Result<(), OrgApiError> {
        self.count(|c| c.deletes += 1);
        self.check_failure()
    }

    async fn create_ip_address(
        &self,
        _org_api_id: &str,
        params: &IpAddressParams,
    ) -> Result<IpAddressEntry, OrgApiError> {
        self.count(|c| c.create_ip_address += 1);
        self.check_failure()?;
        Ok(IpAddressEntry {
            id: uuid::Uuid::new_v4().to_string(),
            label: params.label.clone(),
            ip_address: params.ip_address.clone(),
        })
    }

    async fn get_ip_addresses(
        &self,
        _org_api_id: &str,
    ) -> Result<Vec<IpAddressEntry>, OrgApiError> {
        self.check_failure()?;
        Ok(Vec::new())
    }

    async fn delete_ip_address(&self, _org_api_id: &str, _addr_id: &str) -> Result<(), OrgApiError> {
        self.count(|c| c.deletes += 1);
        self.check_failure()
    }
}
