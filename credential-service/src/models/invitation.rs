//! Invitation model - organization-role invitations for Authorized
//! Officials and Credential Delegates.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::identity::VerifiedClaims;

/// Invitations older than this are no longer acceptable.
pub const EXPIRATION_HOURS: i64 = 48;

/// Role the invitation grants on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationType {
    AuthorizedOfficial,
    CredentialDelegate,
}

impl InvitationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationType::AuthorizedOfficial => "authorized_official",
            InvitationType::CredentialDelegate => "credential_delegate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorized_official" => Some(InvitationType::AuthorizedOfficial),
            "credential_delegate" => Some(InvitationType::CredentialDelegate),
            _ => None,
        }
    }
}

/// Invitation state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Renewed,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Renewed => "renewed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "expired" => Some(InvitationStatus::Expired),
            "renewed" => Some(InvitationStatus::Renewed),
            _ => None,
        }
    }
}

/// Invitation entity.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub invitation_type: InvitationType,
    pub status: InvitationStatus,
    pub provider_organization_id: Uuid,
    /// Inviting user; absent for self-service AO invitations.
    pub invited_by_user_id: Option<Uuid>,
    pub invited_given_name: String,
    pub invited_family_name: String,
    pub invited_phone: String,
    pub invited_email: String,
    /// Six-character code mailed separately and checked at the confirm
    /// step of CD acceptance.
    pub verification_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invitation_type: InvitationType,
        provider_organization_id: Uuid,
        invited_by_user_id: Option<Uuid>,
        invited_given_name: String,
        invited_family_name: String,
        invited_phone: String,
        invited_email: String,
        verification_code: Option<String>,
    ) -> Self {
        Self {
            invitation_id: Uuid::new_v4(),
            invitation_type,
            status: InvitationStatus::Pending,
            provider_organization_id,
            invited_by_user_id,
            invited_given_name,
            invited_family_name,
            invited_phone,
            invited_email,
            verification_code,
            created_at: Utc::now(),
        }
    }

    pub fn is_authorized_official(&self) -> bool {
        self.invitation_type == InvitationType::AuthorizedOfficial
    }

    pub fn is_credential_delegate(&self) -> bool {
        self.invitation_type == InvitationType::CredentialDelegate
    }

    /// An invitation two or more days old can no longer be accepted.
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at >= Duration::hours(EXPIRATION_HOURS)
    }

    pub fn is_accepted(&self) -> bool {
        self.status == InvitationStatus::Accepted
    }

    /// Compare the accepting identity's verified claims against the
    /// invited person. AO invitations match on email alone (any verified
    /// address); CD invitations also require the given and family names.
    /// All comparisons are case-insensitive.
    pub fn matches_claims(&self, claims: &VerifiedClaims) -> bool {
        match self.invitation_type {
            InvitationType::AuthorizedOfficial => self.matches_email(claims),
            InvitationType::CredentialDelegate => {
                self.matches_email(claims)
                    && eq_ignore_case(&self.invited_given_name, &claims.given_name)
                    && eq_ignore_case(&self.invited_family_name, &claims.family_name)
            }
        }
    }

    /// True when any of the identity's verified email addresses matches
    /// the invited email.
    pub fn matches_email(&self, claims: &VerifiedClaims) -> bool {
        claims
            .all_emails()
            .iter()
            .any(|email| eq_ignore_case(email, &self.invited_email))
    }

    /// Remove invited-person PII once the invitation has served its
    /// purpose; the org link carries the authority from here on.
    pub fn scrub_pii(&mut self) {
        self.invited_given_name.clear();
        self.invited_family_name.clear();
        self.invited_phone.clear();
        self.invited_email.clear();
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::VerifiedClaims;

    fn ao_invite() -> Invitation {
        Invitation::new(
            InvitationType::AuthorizedOfficial,
            Uuid::new_v4(),
            None,
            String::new(),
            String::new(),
            String::new(),
            "bob@testy.com".to_string(),
            None,
        )
    }

    fn cd_invite() -> Invitation {
        Invitation::new(
            InvitationType::CredentialDelegate,
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            "Bob".to_string(),
            "Hodges".to_string(),
            "2222222222".to_string(),
            "bob@testy.com".to_string(),
            Some("ABC123".to_string()),
        )
    }

    fn claims() -> VerifiedClaims {
        VerifiedClaims {
            sub: "097d06f7-e9ad-4327-8db3-0ba193b7a2c2".to_string(),
            email: "bob@testy.com".to_string(),
            additional_emails: vec!["david@example.com".to_string()],
            given_name: "Bob".to_string(),
            family_name: "Hodges".to_string(),
            phone: "+1111111111".to_string(),
            pac_id: "900888888".to_string(),
        }
    }

    #[test]
    fn not_expired_under_48_hours() {
        let mut invitation = ao_invite();
        invitation.created_at = Utc::now() - Duration::hours(47);
        assert!(!invitation.is_expired());
    }

    #[test]
    fn expired_at_48_hours() {
        let mut invitation = ao_invite();
        invitation.created_at = Utc::now() - Duration::hours(48);
        assert!(invitation.is_expired());
    }

    #[test]
    fn expired_over_48_hours() {
        let mut invitation = ao_invite();
        invitation.created_at = Utc::now() - Duration::hours(49);
        assert!(invitation.is_expired());
    }

    #[test]
    fn ao_matches_on_email_alone() {
        let invitation = ao_invite();
        let mut claims = claims();
        claims.given_name = "Hugo".to_string();
        claims.family_name = "Boss".to_string();
        assert!(invitation.matches_claims(&claims));
    }

    #[test]
    fn ao_matches_email_case_insensitively() {
        let invitation = ao_invite();
        let mut claims = claims();
        claims.email = "Bob@testy.com".to_string();
        assert!(invitation.matches_claims(&claims));
    }

    #[test]
    fn ao_matches_any_verified_email() {
        let mut invitation = ao_invite();
        invitation.invited_email = "david@example.com".to_string();
        assert!(invitation.matches_claims(&claims()));
    }

    #[test]
    fn ao_rejects_wrong_email() {
        let invitation = ao_invite();
        let mut claims = claims();
        claims.email = "someone@else.com".to_string();
        claims.additional_emails.clear();
        assert!(!invitation.matches_claims(&claims));
    }

    #[test]
    fn cd_matches_names_and_email() {
        assert!(cd_invite().matches_claims(&claims()));
    }

    #[test]
    fn cd_matches_names_case_insensitively() {
        let invitation = cd_invite();
        let mut claims = claims();
        claims.given_name = "BOB".to_string();
        claims.family_name = "hodges".to_string();
        assert!(invitation.matches_claims(&claims));
    }

    #[test]
    fn cd_rejects_wrong_given_name() {
        let invitation = cd_invite();
        let mut claims = claims();
        claims.given_name = "Robert".to_string();
        assert!(!invitation.matches_claims(&claims));
    }

    #[test]
    fn cd_rejects_wrong_family_name() {
        let invitation = cd_invite();
        let mut claims = claims();
        claims.family_name = "Hoskins".to_string();
        assert!(!invitation.matches_claims(&claims));
    }

    #[test]
    fn scrub_pii_clears_invited_fields() {
        let mut invitation = cd_invite();
        invitation.scrub_pii();
        assert!(invitation.invited_given_name.is_empty());
        assert!(invitation.invited_family_name.is_empty());
        assert!(invitation.invited_phone.is_empty());
        assert!(invitation.invited_email.is_empty());
    }
}
