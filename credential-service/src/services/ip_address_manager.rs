//! IP allow-list management, delegated to the organization API.

use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

use super::audit::CredentialAuditService;
use super::error::CredentialError;
use super::org_client::{IpAddressEntry, IpAddressParams, OrganizationClient};
use super::public_key_manager::MAX_LABEL_LENGTH;
use crate::models::{CredentialAction, CredentialType};

pub struct IpAddressManager {
    client: Arc<dyn OrganizationClient>,
    audit: CredentialAuditService,
}

impl IpAddressManager {
    pub fn new(client: Arc<dyn OrganizationClient>, audit: CredentialAuditService) -> Self {
        Self { client, audit }
    }

    #[tracing::instrument(skip_all, fields(org = %org_api_id, label = %label))]
    pub async fn create_ip_address(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        org_api_id: &str,
        label: &str,
        ip_address: &str,
    ) -> Result<IpAddressEntry, CredentialError> {
        if label.len() > MAX_LABEL_LENGTH {
            return Err(CredentialError::LabelTooLong);
        }

        if ip_address.parse::<IpAddr>().is_err() {
            return Err(CredentialError::InvalidIp);
        }

        let entry = self
            .client
            .create_ip_address(
                org_api_id,
                &IpAddressParams {
                    label: label.to_string(),
                    ip_address: ip_address.to_string(),
                },
            )
            .await?;

        self.audit
            .record(
                actor_user_id,
                organization_id,
                CredentialType::IpAddress,
                CredentialAction::Add,
            )
            .await;

        Ok(entry)
    }

    pub async fn delete_ip_address(
        &self,
        actor_user_id: Uuid,
        organization_id: Uuid,
        org_api_id: &str,
        addr_id: &str,
    ) -> Result<(), CredentialError> {
        self.client.delete_ip_address(org_api_id, addr_id).await?;

        self.audit
            .record(
                actor_user_id,
                organization_id,
                CredentialType::IpAddress,
                CredentialAction::Remove,
            )
            .await;

        Ok(())
    }

    pub async fn ip_addresses(&self, org_api_id: &str) -> Vec<IpAddressEntry> {
        match self.client.get_ip_addresses(org_api_id).await {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::error!(error = %e, org = %org_api_id, "Failed to list IP addresses");
                Vec::new()
            }
        }
    }
}
