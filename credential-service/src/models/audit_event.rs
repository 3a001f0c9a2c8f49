//! Credential-management audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ClientToken,
    PublicKey,
    IpAddress,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::ClientToken => "client_token",
            CredentialType::PublicKey => "public_key",
            CredentialType::IpAddress => "ip_address",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialAction {
    Add,
    Remove,
}

impl CredentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialAction::Add => "add",
            CredentialAction::Remove => "remove",
        }
    }
}

/// One credential-management action: who did what, where, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialAuditEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub provider_organization_id: Uuid,
    pub credential_type: CredentialType,
    pub action: CredentialAction,
    pub created_at: DateTime<Utc>,
}

impl CredentialAuditEvent {
    pub fn new(
        user_id: Uuid,
        provider_organization_id: Uuid,
        credential_type: CredentialType,
        action: CredentialAction,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            provider_organization_id,
            credential_type,
            action,
            created_at: Utc::now(),
        }
    }
}
