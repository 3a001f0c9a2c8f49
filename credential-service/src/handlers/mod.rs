pub mod client_tokens;
pub mod invitations;
pub mod ip_addresses;
pub mod organizations;
pub mod public_keys;

use axum::http::HeaderMap;
use portal_core::error::AppError;
use uuid::Uuid;

/// Acting portal user, resolved upstream by the session layer and passed
/// through as a header.
pub(crate) fn actor_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing or invalid x-user-id")))
}

/// Identity-gateway access token from the Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")))
}
