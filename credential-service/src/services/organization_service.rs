//! Provider organization provisioning: local NPI validation and
//! uniqueness, then creation at the external organization API.

use std::sync::Arc;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use super::error::InvitationError;
use super::org_client::{CreateOrganizationRequest, OrganizationClient};
use super::store::PortalStore;
use crate::models::ProviderOrganization;
use crate::utils::npi;

#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    #[error("validation failed")]
    Validation(#[source] ValidationErrors),

    #[error(transparent)]
    Api(#[from] super::org_client::OrgApiError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<OrganizationError> for portal_core::error::AppError {
    fn from(err: OrganizationError) -> Self {
        match err {
            OrganizationError::Validation(errors) => {
                portal_core::error::AppError::ValidationError(errors)
            }
            OrganizationError::Api(e) => {
                tracing::error!(error = %e, "Organization API failure during provisioning");
                portal_core::error::AppError::ServiceUnavailable
            }
            OrganizationError::Storage(detail) => {
                portal_core::error::AppError::InternalError(anyhow::anyhow!(detail))
            }
        }
    }
}

pub struct OrganizationService {
    store: Arc<dyn PortalStore>,
    client: Arc<dyn OrganizationClient>,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn PortalStore>, client: Arc<dyn OrganizationClient>) -> Self {
        Self { store, client }
    }

    /// Create a provider organization locally and at the organization API.
    #[tracing::instrument(skip_all, fields(npi = %npi_value))]
    pub async fn create(
        &self,
        name: &str,
        npi_value: &str,
    ) -> Result<ProviderOrganization, OrganizationError> {
        let mut errors = ValidationErrors::new();

        if name.is_empty() {
            errors.add("name", ValidationError::new("can't be blank"));
        }
        if !npi::valid_npi(npi_value) {
            errors.add("npi", ValidationError::new("is invalid"));
        }
        if errors.is_empty()
            && self
                .store
                .organization_npi_exists(npi_value)
                .await
                .map_err(|e| OrganizationError::Storage(e.to_string()))?
        {
            errors.add("npi", ValidationError::new("has already been registered"));
        }

        if !errors.is_empty() {
            return Err(OrganizationError::Validation(errors));
        }

        let created = self
            .client
            .create_organization(&CreateOrganizationRequest {
                name: name.to_string(),
                npi: npi_value.to_string(),
            })
            .await?;

        let mut organization = ProviderOrganization::new(name.to_string(), npi_value.to_string());
        organization.api_organization_id = Some(created.id);

        self.store
            .insert_organization(&organization)
            .await
            .map_err(|e| OrganizationError::Storage(e.to_string()))?;

        tracing::info!(organization_id = %organization.organization_id, "Organization provisioned");
        Ok(organization)
    }

    pub async fn find(
        &self,
        organization_id: Uuid,
    ) -> Result<ProviderOrganization, InvitationError> {
        self.store
            .find_organization(organization_id)
            .await
            .map_err(InvitationError::storage)?
            .ok_or(InvitationError::Invalid)
    }
}
