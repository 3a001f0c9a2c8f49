//! Invitation lifecycle: creation, identity-verified acceptance, renewal.
//!
//! States move `pending -> {accepted, expired, renewed}`; the terminal
//! states never transition further. A renewed AO invitation spawns a
//! fresh record rather than reviving the old one.

use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use super::deliverability::DeliverabilityChecker;
use super::email::Mailer;
use super::error::InvitationError;
use super::identity::{UserInfoError, UserInfoService, VerifiedClaims};
use super::store::PortalStore;
use super::throttle::MailThrottle;
use crate::models::{
    AoOrgLink, CdOrgLink, Invitation, InvitationStatus, InvitationType, ProviderOrganization,
    User,
};

const VERIFICATION_CODE_LENGTH: usize = 6;
const VERIFICATION_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Attributes for a new Credential Delegate invitation. Names and phone
/// are required; the phone must carry exactly ten digits.
#[derive(Debug, Clone, Validate)]
pub struct CdInvitationAttributes {
    #[validate(length(min = 1, message = "can't be blank"))]
    pub invited_given_name: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub invited_family_name: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub phone_raw: String,
    #[validate(email(message = "is invalid"))]
    pub invited_email: String,
    #[validate(must_match(other = "invited_email", message = "doesn't match invited email"))]
    pub invited_email_confirmation: String,
}

/// Attributes for a new Authorized Official invitation. Only the email is
/// required; the official's name comes from identity proofing later.
#[derive(Debug, Clone, Validate)]
pub struct AoInvitationAttributes {
    pub invited_given_name: String,
    pub invited_family_name: String,
    #[validate(email(message = "is invalid"))]
    pub invited_email: String,
    #[validate(must_match(other = "invited_email", message = "doesn't match invited email"))]
    pub invited_email_confirmation: String,
}

/// Result of a completed registration.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user: User,
    pub invitation: Invitation,
}

pub struct InvitationService {
    store: Arc<dyn PortalStore>,
    identity: Arc<dyn UserInfoService>,
    mailer: Arc<dyn Mailer>,
    deliverability: Arc<dyn DeliverabilityChecker>,
    throttle: MailThrottle,
}

impl InvitationService {
    pub fn new(
        store: Arc<dyn PortalStore>,
        identity: Arc<dyn UserInfoService>,
        mailer: Arc<dyn Mailer>,
        deliverability: Arc<dyn DeliverabilityChecker>,
        throttle: MailThrottle,
    ) -> Self {
        Self {
            store,
            identity,
            mailer,
            deliverability,
            throttle,
        }
    }

    // ==================== Creation ====================

    /// Invite a Credential Delegate to `organization_id`. Only an active
    /// Authorized Official of the organization may invite.
    #[tracing::instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn invite_credential_delegate(
        &self,
        organization_id: Uuid,
        invited_by_user_id: Uuid,
        attrs: CdInvitationAttributes,
    ) -> Result<Invitation, InvitationError> {
        let organization = self.require_organization(organization_id).await?;

        self.store
            .find_active_ao_link(invited_by_user_id, organization_id)
            .await
            .map_err(InvitationError::storage)?
            .ok_or(InvitationError::NotAuthorized)?;

        let mut errors = attrs.validate().err().unwrap_or_else(ValidationErrors::new);

        let invited_phone: String = attrs.phone_raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if !attrs.phone_raw.is_empty() && invited_phone.len() != 10 {
            errors.add("invited_phone", ValidationError::new("is invalid"));
        }

        self.check_deliverability(&attrs.invited_email, &mut errors)
            .await;

        if !errors.is_empty() {
            return Err(InvitationError::Validation(errors));
        }

        let invitation = Invitation::new(
            InvitationType::CredentialDelegate,
            organization.organization_id,
            Some(invited_by_user_id),
            attrs.invited_given_name,
            attrs.invited_family_name,
            invited_phone,
            attrs.invited_email,
            Some(generate_verification_code()),
        );

        self.store
            .insert_invitation(&invitation)
            .await
            .map_err(InvitationError::storage)?;

        self.dispatch(&invitation).await;

        tracing::info!(invitation_id = %invitation.invitation_id, "Credential delegate invited");
        Ok(invitation)
    }

    /// Self-service Authorized Official invitation; no inviting user.
    #[tracing::instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn invite_authorized_official(
        &self,
        organization_id: Uuid,
        attrs: AoInvitationAttributes,
    ) -> Result<Invitation, InvitationError> {
        let organization = self.require_organization(organization_id).await?;

        let mut errors = attrs.validate().err().unwrap_or_else(ValidationErrors::new);
        self.check_deliverability(&attrs.invited_email, &mut errors)
            .await;

        if !errors.is_empty() {
            return Err(InvitationError::Validation(errors));
        }

        let invitation = Invitation::new(
            InvitationType::AuthorizedOfficial,
            organization.organization_id,
            None,
            attrs.invited_given_name,
            attrs.invited_family_name,
            String::new(),
            attrs.invited_email,
            None,
        );

        self.store
            .insert_invitation(&invitation)
            .await
            .map_err(InvitationError::storage)?;

        self.dispatch(&invitation).await;

        tracing::info!(invitation_id = %invitation.invitation_id, "Authorized official invited");
        Ok(invitation)
    }

    // ==================== Acceptance ====================

    /// First acceptance step: resolve the invitation, check its state and
    /// age, fetch verified claims, and match them against the invited
    /// person.
    #[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
    pub async fn verify_identity(
        &self,
        organization_id: Uuid,
        invitation_id: Uuid,
        access_token: &str,
    ) -> Result<(Invitation, VerifiedClaims), InvitationError> {
        let invitation = self.acceptable_invitation(organization_id, invitation_id).await?;

        let claims = match self.identity.user_info(access_token).await {
            Ok(claims) => claims,
            Err(UserInfoError::Unauthorized) => return Err(InvitationError::Unauthorized),
            Err(UserInfoError::Gateway(detail)) => {
                return Err(InvitationError::ServerError(detail))
            }
        };

        if !invitation.matches_email(&claims) {
            tracing::warn!(invitation_id = %invitation_id, "Invitation email mismatch");
            return Err(match invitation.invitation_type {
                InvitationType::AuthorizedOfficial => InvitationError::EmailMismatch,
                InvitationType::CredentialDelegate => InvitationError::PiiMismatch,
            });
        }

        if !invitation.matches_claims(&claims) {
            tracing::warn!(invitation_id = %invitation_id, "Invitation PII mismatch");
            return Err(InvitationError::PiiMismatch);
        }

        Ok((invitation, claims))
    }

    /// Second acceptance step: for CD invitations the out-of-band
    /// verification code must match.
    pub fn confirm(
        &self,
        invitation: &Invitation,
        verification_code: Option<&str>,
    ) -> Result<(), InvitationError> {
        if !invitation.is_credential_delegate() {
            return Ok(());
        }

        match (&invitation.verification_code, verification_code) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => Err(InvitationError::CodeMismatch),
        }
    }

    /// Final acceptance step: create or find the user, grant the role,
    /// mark the invitation accepted, and scrub its PII.
    #[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
    pub async fn register(
        &self,
        organization_id: Uuid,
        invitation_id: Uuid,
        access_token: &str,
        verification_code: Option<&str>,
    ) -> Result<RegistrationOutcome, InvitationError> {
        let (mut invitation, claims) = self
            .verify_identity(organization_id, invitation_id, access_token)
            .await?;
        self.confirm(&invitation, verification_code)?;

        let user = self.find_or_create_user(&claims).await?;

        match invitation.invitation_type {
            InvitationType::AuthorizedOfficial => {
                let link = AoOrgLink::new(
                    user.user_id,
                    organization_id,
                    Some(invitation.invitation_id),
                );
                self.store
                    .insert_ao_org_link(&link)
                    .await
                    .map_err(InvitationError::storage)?;
                self.store
                    .set_user_pac_id_if_absent(user.user_id, &claims.pac_id)
                    .await
                    .map_err(InvitationError::storage)?;
            }
            InvitationType::CredentialDelegate => {
                let link =
                    CdOrgLink::new(user.user_id, organization_id, invitation.invitation_id);
                self.store
                    .insert_cd_org_link(&link)
                    .await
                    .map_err(InvitationError::storage)?;
            }
        }

        self.store
            .update_invitation_status(invitation.invitation_id, InvitationStatus::Accepted)
            .await
            .map_err(InvitationError::storage)?;
        self.store
            .scrub_invitation_pii(invitation.invitation_id)
            .await
            .map_err(InvitationError::storage)?;

        invitation.status = InvitationStatus::Accepted;
        invitation.scrub_pii();

        tracing::info!(
            invitation_id = %invitation.invitation_id,
            user_id = %user.user_id,
            "Invitation accepted"
        );

        Ok(RegistrationOutcome { user, invitation })
    }

    // ==================== Renewal ====================

    /// Issue a fresh invitation for an expired, unaccepted AO invitation.
    /// The old record transitions to `renewed` and stays terminal.
    #[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
    pub async fn renew(
        &self,
        organization_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Invitation, InvitationError> {
        let invitation = self.find_for_organization(organization_id, invitation_id).await?;

        // Renewable: an AO invitation that aged out unaccepted, whether
        // or not the lazy expiry transition has already run.
        let renewable = invitation.is_authorized_official()
            && matches!(
                invitation.status,
                InvitationStatus::Pending | InvitationStatus::Expired
            )
            && invitation.is_expired();
        if !renewable {
            return Err(InvitationError::RenewalRefused);
        }

        let replacement = Invitation::new(
            InvitationType::AuthorizedOfficial,
            invitation.provider_organization_id,
            invitation.invited_by_user_id,
            invitation.invited_given_name.clone(),
            invitation.invited_family_name.clone(),
            invitation.invited_phone.clone(),
            invitation.invited_email.clone(),
            None,
        );

        self.store
            .insert_invitation(&replacement)
            .await
            .map_err(InvitationError::storage)?;
        self.store
            .update_invitation_status(invitation.invitation_id, InvitationStatus::Renewed)
            .await
            .map_err(InvitationError::storage)?;

        self.dispatch(&replacement).await;

        tracing::info!(
            old_invitation_id = %invitation.invitation_id,
            new_invitation_id = %replacement.invitation_id,
            "Invitation renewed"
        );

        Ok(replacement)
    }

    // ==================== Internals ====================

    async fn require_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<ProviderOrganization, InvitationError> {
        self.store
            .find_organization(organization_id)
            .await
            .map_err(InvitationError::storage)?
            .ok_or(InvitationError::Invalid)
    }

    async fn find_for_organization(
        &self,
        organization_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Invitation, InvitationError> {
        let invitation = self
            .store
            .find_invitation(invitation_id)
            .await
            .map_err(InvitationError::storage)?
            .ok_or(InvitationError::Invalid)?;

        // An invitation reached through the wrong organization is treated
        // as missing, not as a state error.
        if invitation.provider_organization_id != organization_id {
            return Err(InvitationError::Invalid);
        }

        Ok(invitation)
    }

    /// Resolve an invitation that is still open for acceptance, lazily
    /// expiring stale pending records.
    async fn acceptable_invitation(
        &self,
        organization_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Invitation, InvitationError> {
        let invitation = self.find_for_organization(organization_id, invitation_id).await?;

        let expired_error = || match invitation.invitation_type {
            InvitationType::AuthorizedOfficial => InvitationError::AoExpired,
            InvitationType::CredentialDelegate => InvitationError::CdExpired,
        };

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Accepted => {
                return Err(match invitation.invitation_type {
                    InvitationType::AuthorizedOfficial => InvitationError::AoRenewed,
                    InvitationType::CredentialDelegate => InvitationError::CdAccepted,
                })
            }
            InvitationStatus::Renewed => return Err(InvitationError::AoRenewed),
            InvitationStatus::Expired => return Err(expired_error()),
        }

        if invitation.is_expired() {
            self.store
                .update_invitation_status(invitation.invitation_id, InvitationStatus::Expired)
                .await
                .map_err(InvitationError::storage)?;
            return Err(expired_error());
        }

        Ok(invitation)
    }

    async fn find_or_create_user(&self, claims: &VerifiedClaims) -> Result<User, InvitationError> {
        if let Some(user) = self
            .store
            .find_user_by_uid(&claims.sub)
            .await
            .map_err(InvitationError::storage)?
        {
            return Ok(user);
        }

        let user = User::new(
            claims.sub.clone(),
            claims.email.clone(),
            claims.given_name.clone(),
            claims.family_name.clone(),
        );
        self.store
            .insert_user(&user)
            .await
            .map_err(InvitationError::storage)?;
        Ok(user)
    }

    async fn check_deliverability(&self, email: &str, errors: &mut ValidationErrors) {
        // Skip the MX lookup when the address already failed format checks.
        if email.is_empty() || errors.field_errors().contains_key("invited_email") {
            return;
        }
        if !self.deliverability.is_deliverable(email).await {
            errors.add("invited_email", ValidationError::new("is undeliverable"));
        }
    }

    /// Throttle-gated dispatch. Creation already succeeded; a throttled
    /// or failed send is logged and dropped.
    async fn dispatch(&self, invitation: &Invitation) {
        if !self.throttle.allow(&invitation.invited_email).await {
            tracing::warn!(
                invitation_id = %invitation.invitation_id,
                "Invitation mail throttled"
            );
            return;
        }

        let result = match invitation.invitation_type {
            InvitationType::AuthorizedOfficial => self.mailer.send_ao_invitation(invitation).await,
            InvitationType::CredentialDelegate => self.mailer.send_cd_invitation(invitation).await,
        };

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                invitation_id = %invitation.invitation_id,
                "Failed to dispatch invitation mail"
            );
        }
    }
}

fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFICATION_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..VERIFICATION_CODE_ALPHABET.len());
            VERIFICATION_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_code_has_six_characters() {
        let code = generate_verification_code();
        assert_eq!(code.len(), VERIFICATION_CODE_LENGTH);
        assert!(code.bytes().all(|b| VERIFICATION_CODE_ALPHABET.contains(&b)));
    }
}
