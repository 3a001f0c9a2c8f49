//! Credential-management audit logging.

use std::sync::Arc;
use uuid::Uuid;

use super::store::PortalStore;
use crate::models::{CredentialAction, CredentialAuditEvent, CredentialType};

#[derive(Clone)]
pub struct CredentialAuditService {
    store: Arc<dyn PortalStore>,
}

impl CredentialAuditService {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self { store }
    }

    /// Record a credential-management action.
    pub async fn record(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        credential_type: CredentialType,
        action: CredentialAction,
    ) {
        let event = CredentialAuditEvent::new(user_id, organization_id, credential_type, action);

        tracing::info!(
            user_id = %user_id,
            organization_id = %organization_id,
            credential_type = %credential_type.as_str(),
            action = %action.as_str(),
            "Credential management action"
        );

        if let Err(e) = self.store.insert_audit_event(&event).await {
            tracing::error!(
                error = %e,
                event_id = %event.event_id,
                "Failed to write credential audit event"
            );
        }
    }

    /// Record without awaiting the write (non-blocking).
    pub fn record_async(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        credential_type: CredentialType,
        action: CredentialAction,
    ) {
        let service = self.clone();
        tokio::spawn(async move {
            service
                .record(user_id, organization_id, credential_type, action)
                .await;
        });
    }
}
