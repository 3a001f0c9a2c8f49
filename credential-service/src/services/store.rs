//! Persistence layer: the `PortalStore` trait, its PostgreSQL
//! implementation, and an in-memory double for tests and single-process
//! deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{
    AoOrgLink, CdOrgLink, CredentialAction, CredentialAuditEvent, CredentialType, Invitation,
    InvitationStatus, InvitationType, ProviderOrganization, User,
};

#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn find_invitation(&self, invitation_id: Uuid) -> Result<Option<Invitation>, AppError>;
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError>;
    async fn update_invitation_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), AppError>;
    /// Clear invited-person PII after acceptance.
    async fn scrub_invitation_pii(&self, invitation_id: Uuid) -> Result<(), AppError>;

    async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<ProviderOrganization>, AppError>;
    async fn insert_organization(&self, org: &ProviderOrganization) -> Result<(), AppError>;
    async fn organization_npi_exists(&self, npi: &str) -> Result<bool, AppError>;

    async fn find_user_by_uid(&self, uid: &str) -> Result<Option<User>, AppError>;
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;
    /// Set `pac_id` only when the user does not already have one.
    async fn set_user_pac_id_if_absent(&self, user_id: Uuid, pac_id: &str)
        -> Result<(), AppError>;

    async fn insert_ao_org_link(&self, link: &AoOrgLink) -> Result<(), AppError>;
    async fn insert_cd_org_link(&self, link: &CdOrgLink) -> Result<(), AppError>;
    async fn find_active_ao_link(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<AoOrgLink>, AppError>;
    async fn find_cd_link_by_invitation(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<CdOrgLink>, AppError>;

    async fn insert_audit_event(&self, event: &CredentialAuditEvent) -> Result<(), AppError>;
    async fn audit_events_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<CredentialAuditEvent>, AppError>;
}

// ==================== PostgreSQL implementation ====================

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(FromRow)]
struct InvitationRow {
    invitation_id: Uuid,
    invitation_type: String,
    status: String,
    provider_organization_id: Uuid,
    invited_by_user_id: Option<Uuid>,
    invited_given_name: String,
    invited_family_name: String,
    invited_phone: String,
    invited_email: String,
    verification_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = AppError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let invitation_type = InvitationType::parse(&row.invitation_type).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "unknown invitation type: {}",
                row.invitation_type
            ))
        })?;
        let status = InvitationStatus::parse(&row.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("unknown invitation status: {}", row.status))
        })?;

        Ok(Invitation {
            invitation_id: row.invitation_id,
            invitation_type,
            status,
            provider_organization_id: row.provider_organization_id,
            invited_by_user_id: row.invited_by_user_id,
            invited_given_name: row.invited_given_name,
            invited_family_name: row.invited_family_name,
            invited_phone: row.invited_phone,
            invited_email: row.invited_email,
            verification_code: row.verification_code,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrganizationRow {
    organization_id: Uuid,
    name: String,
    npi: String,
    api_organization_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrganizationRow> for ProviderOrganization {
    fn from(row: OrganizationRow) -> Self {
        Self {
            organization_id: row.organization_id,
            name: row.name,
            npi: row.npi,
            api_organization_id: row.api_organization_id,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    uid: String,
    email: String,
    given_name: String,
    family_name: String,
    pac_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.user_id,
            uid: row.uid,
            email: row.email,
            given_name: row.given_name,
            family_name: row.family_name,
            pac_id: row.pac_id,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct LinkRow {
    link_id: Uuid,
    user_id: Uuid,
    provider_organization_id: Uuid,
    invitation_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct AuditEventRow {
    event_id: Uuid,
    user_id: Uuid,
    provider_organization_id: Uuid,
    credential_type: String,
    action: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditEventRow> for CredentialAuditEvent {
    type Error = AppError;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        let credential_type = match row.credential_type.as_str() {
            "client_token" => CredentialType::ClientToken,
            "public_key" => CredentialType::PublicKey,
            "ip_address" => CredentialType::IpAddress,
            other => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "unknown credential type: {}",
                    other
                )))
            }
        };
        let action = match row.action.as_str() {
            "add" => CredentialAction::Add,
            "remove" => CredentialAction::Remove,
            other => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "unknown credential action: {}",
                    other
                )))
            }
        };

        Ok(CredentialAuditEvent {
            event_id: row.event_id,
            user_id: row.user_id,
            provider_organization_id: row.provider_organization_id,
            credential_type,
            action,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PortalStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    async fn find_invitation(&self, invitation_id: Uuid) -> Result<Option<Invitation>, AppError> {
        let row = sqlx::query_as::<_, InvitationRow>(
            "SELECT * FROM invitations WHERE invitation_id = $1",
        )
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        row.map(Invitation::try_from).transpose()
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invitations (invitation_id, invitation_type, status, provider_organization_id, invited_by_user_id, invited_given_name, invited_family_name, invited_phone, invited_email, verification_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(invitation.invitation_type.as_str())
        .bind(invitation.status.as_str())
        .bind(invitation.provider_organization_id)
        .bind(invitation.invited_by_user_id)
        .bind(&invitation.invited_given_name)
        .bind(&invitation.invited_family_name)
        .bind(&invitation.invited_phone)
        .bind(&invitation.invited_email)
        .bind(&invitation.verification_code)
        .bind(invitation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn update_invitation_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE invitations SET status = $2 WHERE invitation_id = $1")
            .bind(invitation_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn scrub_invitation_pii(&self, invitation_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE invitations
            SET invited_given_name = '', invited_family_name = '', invited_phone = '', invited_email = ''
            WHERE invitation_id = $1
            "#,
        )
        .bind(invitation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<ProviderOrganization>, AppError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT * FROM provider_organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(row.map(ProviderOrganization::from))
    }

    async fn insert_organization(&self, org: &ProviderOrganization) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO provider_organizations (organization_id, name, npi, api_organization_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(org.organization_id)
        .bind(&org.name)
        .bind(&org.npi)
        .bind(&org.api_organization_id)
        .bind(org.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn organization_npi_exists(&self, npi: &str) -> Result<bool, AppError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM provider_organizations WHERE npi = $1 LIMIT 1")
                .bind(npi)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(row.is_some())
    }

    async fn find_user_by_uid(&self, uid: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(row.map(User::from))
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, uid, email, given_name, family_name, pac_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.uid)
        .bind(&user.email)
        .bind(&user.given_name)
        .bind(&user.family_name)
        .bind(&user.pac_id)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn set_user_pac_id_if_absent(
        &self,
        user_id: Uuid,
        pac_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET pac_id = $2 WHERE user_id = $1 AND pac_id IS NULL")
            .bind(user_id)
            .bind(pac_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn insert_ao_org_link(&self, link: &AoOrgLink) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO ao_org_links (link_id, user_id, provider_organization_id, invitation_id, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(link.link_id)
        .bind(link.user_id)
        .bind(link.provider_organization_id)
        .bind(link.invitation_id)
        .bind(link.created_at)
        .bind(link.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn insert_cd_org_link(&self, link: &CdOrgLink) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO cd_org_links (link_id, user_id, provider_organization_id, invitation_id, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(link.link_id)
        .bind(link.user_id)
        .bind(link.provider_organization_id)
        .bind(link.invitation_id)
        .bind(link.created_at)
        .bind(link.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn find_active_ao_link(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<AoOrgLink>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT * FROM ao_org_links
            WHERE user_id = $1 AND provider_organization_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(row.map(|r| AoOrgLink {
            link_id: r.link_id,
            user_id: r.user_id,
            provider_organization_id: r.provider_organization_id,
            invitation_id: r.invitation_id,
            created_at: r.created_at,
            revoked_at: r.revoked_at,
        }))
    }

    async fn find_cd_link_by_invitation(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<CdOrgLink>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            "SELECT * FROM cd_org_links WHERE invitation_id = $1",
        )
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        row.map(|r| {
            let invitation_id = r.invitation_id.ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("cd_org_link missing invitation_id"))
            })?;
            Ok(CdOrgLink {
                link_id: r.link_id,
                user_id: r.user_id,
                provider_organization_id: r.provider_organization_id,
                invitation_id,
                created_at: r.created_at,
                revoked_at: r.revoked_at,
            })
        })
        .transpose()
    }

    async fn insert_audit_event(&self, event: &CredentialAuditEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO credential_audit_events (event_id, user_id, provider_organization_id, credential_type, action, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.event_id)
        .bind(event.user_id)
        .bind(event.provider_organization_id)
        .bind(event.credential_type.as_str())
        .bind(event.action.as_str())
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn audit_events_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<CredentialAuditEvent>, AppError> {
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT * FROM credential_audit_events
            WHERE provider_organization_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        rows.into_iter()
            .map(CredentialAuditEvent::try_from)
            .collect()
    }
}

// ==================== In-memory implementation ====================

#[derive(Default)]
struct InMemoryState {
    invitations: Vec<Invitation>,
    organizations: Vec<ProviderOrganization>,
    users: Vec<User>,
    ao_links: Vec<AoOrgLink>,
    cd_links: Vec<CdOrgLink>,
    audit_events: Vec<CredentialAuditEvent>,
}

/// Mutex-backed store for tests and single-process use.
#[derive(Default)]
pub struct InMemoryStore {
    state: std::sync::Mutex<InMemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a stored invitation wholesale. Test support: lets a suite
    /// age or otherwise reshape a record without widening the trait.
    pub fn replace_invitation(&self, invitation: &Invitation) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(existing) = state
                .invitations
                .iter_mut()
                .find(|i| i.invitation_id == invitation.invitation_id)
            {
                *existing = invitation.clone();
            }
        }
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl PortalStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_invitation(&self, invitation_id: Uuid) -> Result<Option<Invitation>, AppError> {
        Ok(self
            .locked()?
            .invitations
            .iter()
            .find(|i| i.invitation_id == invitation_id)
            .cloned())
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        self.locked()?.invitations.push(invitation.clone());
        Ok(())
    }

    async fn update_invitation_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), AppError> {
        let mut state = self.locked()?;
        if let Some(invitation) = state
            .invitations
            .iter_mut()
            .find(|i| i.invitation_id == invitation_id)
        {
            invitation.status = status;
        }
        Ok(())
    }

    async fn scrub_invitation_pii(&self, invitation_id: Uuid) -> Result<(), AppError> {
        let mut state = self.locked()?;
        if let Some(invitation) = state
            .invitations
            .iter_mut()
            .find(|i| i.invitation_id == invitation_id)
        {
            invitation.scrub_pii();
        }
        Ok(())
    }

    async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<ProviderOrganization>, AppError> {
        Ok(self
            .locked()?
            .organizations
            .iter()
            .find(|o| o.organization_id == organization_id)
            .cloned())
    }

    async fn insert_organization(&self, org: &ProviderOrganization) -> Result<(), AppError> {
        self.locked()?.organizations.push(org.clone());
        Ok(())
    }

    async fn organization_npi_exists(&self, npi: &str) -> Result<bool, AppError> {
        Ok(self.locked()?.organizations.iter().any(|o| o.npi == npi))
    }

    async fn find_user_by_uid(&self, uid: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .locked()?
            .users
            .iter()
            .find(|u| u.uid == uid)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.locked()?.users.push(user.clone());
        Ok(())
    }

    async fn set_user_pac_id_if_absent(
        &self,
        user_id: Uuid,
        pac_id: &str,
    ) -> Result<(), AppError> {
        let mut state = self.locked()?;
        if let Some(user) = state.users.iter_mut().find(|u| u.user_id == user_id) {
            if user.pac_id.is_none() {
                user.pac_id = Some(pac_id.to_string());
            }
        }
        Ok(())
    }

    async fn insert_ao_org_link(&self, link: &AoOrgLink) -> Result<(), AppError> {
        self.locked()?.ao_links.push(link.clone());
        Ok(())
    }

    async fn insert_cd_org_link(&self, link: &CdOrgLink) -> Result<(), AppError> {
        self.locked()?.cd_links.push(link.clone());
        Ok(())
    }

    async fn find_active_ao_link(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<AoOrgLink>, AppError> {
        Ok(self
            .locked()?
            .ao_links
            .iter()
            .find(|l| {
                l.user_id == user_id
                    && l.provider_organization_id == organization_id
                    && l.revoked_at.is_none()
            })
            .cloned())
    }

    async fn find_cd_link_by_invitation(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<CdOrgLink>, AppError> {
        Ok(self
            .locked()?
            .cd_links
            .iter()
            .find(|l| l.invitation_id == invitation_id)
            .cloned())
    }

    async fn insert_audit_event(&self, event: &CredentialAuditEvent) -> Result<(), AppError> {
        self.locked()?.audit_events.push(event.clone());
        Ok(())
    }

    async fn audit_events_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<CredentialAuditEvent>, AppError> {
        Ok(self
            .locked()?
            .audit_events
            .iter()
            .filter(|e| e.provider_organization_id == organization_id)
            .cloned()
            .collect())
    }
}
