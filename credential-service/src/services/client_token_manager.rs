//! Client token issuance and revocation, delegated to the organization
//! API. Token material is returned to the caller once and never stored.

use std::sync::Arc;
use uuid::Uuid;

use super::audit::CredentialAuditService;
use super::error::CredentialError;
use super::org_client::{ClientTokenEntry, ClientTokenParams, OrganizationClient};
use super::public_key_manager::MAX_LABEL_LENGTH;
use crate::models::{CredentialAction, CredentialType};

pub struct ClientTokenManager {
    client: Arc<dyn OrganizationClient>,
    audit: CredentialAuditService,
}

impl ClientTokenManager {
    pub fn new(client: Arc<dyn OrganizationClient>, audit: CredentialAuditService) -> Self {
        Self { client, audit }
    }

    #[tracing::instrument(skip_all, fields(org = %org_api_id, label = %label))]
    pub async fn create_token(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        org_api_id: &str,
        label: &str,
    ) -> Result<ClientTokenEntry, CredentialError> {
        if label.is_empty() {
            return Err(CredentialError::LabelMissing);
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(CredentialError::LabelTooLong);
        }

        let entry = self
            .client
            .create_client_token(
                org_api_id,
                &ClientTokenParams {
                    label: label.to_string(),
                },
            )
            .await?;

        self.audit
            .record(
                actor_user_id,
                organization_id,
                CredentialType::ClientToken,
                CredentialAction::Add,
            )
            .await;

        Ok(entry)
    }

    pub async fn delete_token(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        org_api_id: &str,
        token_id: &str,
    ) -> Result<(), CredentialError> {
        self.client.delete_client_token(org_api_id, token_id).await?;

        self.audit
            .record(
                actor_user_id,
                organization_id,
                CredentialType::ClientToken,
                CredentialAction::Remove,
            )
            .await;

        Ok(())
    }

    pub async fn client_tokens(&self, org_api_id: &str) -> Vec<ClientTokenEntry> {
        match self.client.get_client_tokens(org_api_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(error = %e, org = %org_api_id, "Failed to list client tokens");
                Vec::new()
            }
        }
    }
}
