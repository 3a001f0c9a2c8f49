//! Invitation handlers: thin orchestration over the invitation service.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::{AoInvitationAttributes, CdInvitationAttributes};
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCdInvitationRequest {
    pub invited_given_name: String,
    pub invited_family_name: String,
    pub phone_raw: String,
    pub invited_email: String,
    pub invited_email_confirmation: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAoInvitationRequest {
    #[serde(default)]
    pub invited_given_name: String,
    #[serde(default)]
    pub invited_family_name: String,
    pub invited_email: String,
    pub invited_email_confirmation: String,
}

#[derive(Debug, Serialize)]
pub struct InvitationCreatedResponse {
    pub invitation_id: Uuid,
    /// Handed to the Credential Delegate out of band; absent for AO
    /// invitations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfirmRequest {
    pub verification_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub invitation_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Invite a Credential Delegate.
///
/// POST /organizations/{org_id}/credential_delegate_invitations
#[tracing::instrument(skip(state, headers, req), fields(org_id = %org_id))]
pub async fn create_cd_invitation(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreateCdInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationCreatedResponse>), AppError> {
    let actor = super::actor_id(&headers)?;

    let invitation = state
        .invitations
        .invite_credential_delegate(
            org_id,
            actor,
            CdInvitationAttributes {
                invited_given_name: req.invited_given_name,
                invited_family_name: req.invited_family_name,
                phone_raw: req.phone_raw,
                invited_email: req.invited_email,
                invited_email_confirmation: req.invited_email_confirmation,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvitationCreatedResponse {
            invitation_id: invitation.invitation_id,
            verification_code: invitation.verification_code,
        }),
    ))
}

/// Self-service Authorized Official invitation.
///
/// POST /organizations/{org_id}/authorized_official_invitations
#[tracing::instrument(skip(state, req), fields(org_id = %org_id))]
pub async fn create_ao_invitation(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateAoInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationCreatedResponse>), AppError> {
    let invitation = state
        .invitations
        .invite_authorized_official(
            org_id,
            AoInvitationAttributes {
                invited_given_name: req.invited_given_name,
                invited_family_name: req.invited_family_name,
                invited_email: req.invited_email,
                invited_email_confirmation: req.invited_email_confirmation,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvitationCreatedResponse {
            invitation_id: invitation.invitation_id,
            verification_code: None,
        }),
    ))
}

/// Verify the accepting identity against the invitation.
///
/// POST /organizations/{org_id}/invitations/{invitation_id}/accept
#[tracing::instrument(skip(state, headers), fields(org_id = %org_id, invitation_id = %invitation_id))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path((org_id, invitation_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<AcceptResponse>, AppError> {
    let token = super::bearer_token(&headers)?;

    let (invitation, _claims) = state
        .invitations
        .verify_identity(org_id, invitation_id, &token)
        .await?;

    Ok(Json(AcceptResponse {
        invitation_id: invitation.invitation_id,
        status: "identity_verified",
    }))
}

/// Confirm acceptance conditions (CD verification code).
///
/// POST /organizations/{org_id}/invitations/{invitation_id}/confirm
#[tracing::instrument(skip(state, headers, req), fields(org_id = %org_id, invitation_id = %invitation_id))]
pub async fn confirm_invitation(
    State(state): State<AppState>,
    Path((org_id, invitation_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<AcceptResponse>, AppError> {
    let token = super::bearer_token(&headers)?;

    let (invitation, _claims) = state
        .invitations
        .verify_identity(org_id, invitation_id, &token)
        .await?;
    state
        .invitations
        .confirm(&invitation, req.verification_code.as_deref())?;

    Ok(Json(AcceptResponse {
        invitation_id: invitation.invitation_id,
        status: "conditions_verified",
    }))
}

/// Complete registration: grant the organization role.
///
/// POST /organizations/{org_id}/invitations/{invitation_id}/register
#[tracing::instrument(skip(state, headers, req), fields(org_id = %org_id, invitation_id = %invitation_id))]
pub async fn register_invitation(
    State(state): State<AppState>,
    Path((org_id, invitation_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let token = super::bearer_token(&headers)?;

    let outcome = state
        .invitations
        .register(
            org_id,
            invitation_id,
            &token,
            req.verification_code.as_deref(),
        )
        .await?;

    let role = if outcome.invitation.is_authorized_official() {
        "authorized_official"
    } else {
        "credential_delegate"
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: outcome.user.user_id,
            organization_id: org_id,
            role,
        }),
    ))
}

/// Request a fresh invitation for an expired AO invitation.
///
/// POST /organizations/{org_id}/invitations/{invitation_id}/renew
#[tracing::instrument(skip(state), fields(org_id = %org_id, invitation_id = %invitation_id))]
pub async fn renew_invitation(
    State(state): State<AppState>,
    Path((org_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<InvitationCreatedResponse>), AppError> {
    let replacement = state.invitations.renew(org_id, invitation_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvitationCreatedResponse {
            invitation_id: replacement.invitation_id,
            verification_code: None,
        }),
    ))
}
