//! Service-level error taxonomy, mapped onto the shared `AppError` at the
//! handler boundary.

use portal_core::error::AppError;
use thiserror::Error;

use super::org_client::OrgApiError;

/// Outcomes of invitation operations. Mismatch variants carry fixed,
/// non-detail-leaking messages so callers cannot learn which field failed
/// to match.
#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("invitation does not exist or is not valid")]
    Invalid,

    #[error("user is not an authorized official for this organization")]
    NotAuthorized,

    #[error("identity session is no longer valid")]
    Unauthorized,

    #[error("the information on file does not match this invitation")]
    PiiMismatch,

    #[error("the information on file does not match this invitation")]
    EmailMismatch,

    #[error("this invitation has expired")]
    AoExpired,

    #[error("this invitation has expired")]
    CdExpired,

    #[error("this invitation has already been accepted")]
    AoRenewed,

    #[error("this invitation has already been accepted")]
    CdAccepted,

    #[error("the verification code does not match")]
    CodeMismatch,

    #[error("unable to create new invitation")]
    RenewalRefused,

    #[error("validation failed")]
    Validation(#[source] validator::ValidationErrors),

    #[error("identity verification is temporarily unavailable")]
    ServerError(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl InvitationError {
    pub fn storage(err: AppError) -> Self {
        InvitationError::Storage(err.to_string())
    }
}

impl From<InvitationError> for AppError {
    fn from(err: InvitationError) -> Self {
        match err {
            InvitationError::Invalid => {
                AppError::NotFound(anyhow::anyhow!("Invitation does not exist or is not valid"))
            }
            InvitationError::NotAuthorized => AppError::Forbidden(anyhow::anyhow!(
                "You are not an authorized official for this organization"
            )),
            InvitationError::Unauthorized => {
                AppError::Unauthorized(anyhow::anyhow!("Please sign in again"))
            }
            InvitationError::PiiMismatch | InvitationError::EmailMismatch => {
                AppError::Forbidden(anyhow::anyhow!(
                    "The information on file does not match this invitation"
                ))
            }
            InvitationError::AoExpired | InvitationError::CdExpired => {
                AppError::Forbidden(anyhow::anyhow!("This invitation has expired"))
            }
            InvitationError::AoRenewed | InvitationError::CdAccepted => {
                AppError::Forbidden(anyhow::anyhow!("This invitation has already been accepted"))
            }
            InvitationError::CodeMismatch => {
                AppError::BadRequest(anyhow::anyhow!("The verification code does not match"))
            }
            InvitationError::RenewalRefused => {
                AppError::BadRequest(anyhow::anyhow!("Unable to create new invitation"))
            }
            InvitationError::Validation(errors) => AppError::ValidationError(errors),
            InvitationError::ServerError(detail) => {
                tracing::error!(detail = %detail, "Identity gateway failure during invitation flow");
                AppError::ServiceUnavailable
            }
            InvitationError::Storage(detail) => {
                AppError::InternalError(anyhow::anyhow!(detail))
            }
        }
    }
}

/// Outcomes of credential-management operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("public key must be in PEM format")]
    InvalidEncoding,

    #[error("must be a public key")]
    MustBePublicKey,

    #[error("label cannot be over 25 characters")]
    LabelTooLong,

    #[error("label is required")]
    LabelMissing,

    #[error("invalid IP address")]
    InvalidIp,

    #[error(transparent)]
    Api(#[from] OrgApiError),
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidEncoding => AppError::BadRequest(anyhow::anyhow!(
                "Public key must be in PEM format"
            )),
            CredentialError::MustBePublicKey => {
                AppError::BadRequest(anyhow::anyhow!("Must be a public key"))
            }
            CredentialError::LabelTooLong => AppError::BadRequest(anyhow::anyhow!(
                "Label cannot be over 25 characters."
            )),
            CredentialError::LabelMissing => {
                AppError::BadRequest(anyhow::anyhow!("Label is required"))
            }
            CredentialError::InvalidIp => {
                AppError::BadRequest(anyhow::anyhow!("Invalid IP address."))
            }
            CredentialError::Api(OrgApiError::Api(failure)) => {
                tracing::error!(status = failure.status, issues = ?failure.issues, "Organization API failure");
                AppError::BadGateway("The service is temporarily unavailable".to_string())
            }
            CredentialError::Api(OrgApiError::Connection(detail)) => {
                tracing::error!(detail = %detail, "Organization API unreachable");
                AppError::ServiceUnavailable
            }
            CredentialError::Api(OrgApiError::Auth(e)) => {
                tracing::error!(error = %e, "Organization API authorization failure");
                AppError::ServiceUnavailable
            }
        }
    }
}
