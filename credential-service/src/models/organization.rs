//! Provider organization model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrganization {
    pub organization_id: Uuid,
    pub name: String,
    /// Luhn-valid National Provider Identifier.
    pub npi: String,
    /// Identifier assigned by the external organization API; present once
    /// the organization has been provisioned there.
    pub api_organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProviderOrganization {
    pub fn new(name: String, npi: String) -> Self {
        Self {
            organization_id: Uuid::new_v4(),
            name,
            npi,
            api_organization_id: None,
            created_at: Utc::now(),
        }
    }
}
