//! Organization-role links: the durable record of an accepted invitation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authorized Official bound to a provider organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AoOrgLink {
    pub link_id: Uuid,
    pub user_id: Uuid,
    pub provider_organization_id: Uuid,
    pub invitation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Terminal state; a revoked link grants nothing.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AoOrgLink {
    pub fn new(user_id: Uuid, provider_organization_id: Uuid, invitation_id: Option<Uuid>) -> Self {
        Self {
            link_id: Uuid::new_v4(),
            user_id,
            provider_organization_id,
            invitation_id,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Credential Delegate bound to a provider organization. Always traces
/// back to the invitation that granted the role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdOrgLink {
    pub link_id: Uuid,
    pub user_id: Uuid,
    pub provider_organization_id: Uuid,
    pub invitation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl CdOrgLink {
    pub fn new(user_id: Uuid, provider_organization_id: Uuid, invitation_id: Uuid) -> Self {
        Self {
            link_id: Uuid::new_v4(),
            user_id,
            provider_organization_id,
            invitation_id,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}
