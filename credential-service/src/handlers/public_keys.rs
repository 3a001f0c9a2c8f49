//! Public key credential handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::org_client::PublicKeyEntry;
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePublicKeyRequest {
    #[validate(length(min = 1, max = 25))]
    pub label: String,
    #[validate(length(min = 1))]
    pub public_key: String,
    #[serde(default)]
    pub snippet_signature: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub id: String,
    pub label: String,
}

/// POST /organizations/{org_id}/public_keys
#[tracing::instrument(skip(state, headers, req), fields(org_id = %org_id))]
pub async fn create_public_key(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreatePublicKeyRequest>,
) -> Result<(StatusCode, Json<PublicKeyResponse>), AppError> {
    let actor = super::actor_id(&headers)?;
    let org_api_id = state.provisioned_org_api_id(org_id).await?;

    let entry = state
        .public_keys
        .create_public_key(
            actor,
            org_id,
            &org_api_id,
            &req.label,
            &req.public_key,
            &req.snippet_signature,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PublicKeyResponse {
            id: entry.id,
            label: entry.label,
        }),
    ))
}

/// GET /organizations/{org_id}/public_keys
pub async fn list_public_keys(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<PublicKeyEntry>>, AppError> {
    let org_api_id = state.provisioned_org_api_id(org_id).await?;
    Ok(Json(state.public_keys.public_keys(&org_api_id).await))
}

/// DELETE /organizations/{org_id}/public_keys/{key_id}
#[tracing::instrument(skip(state, headers), fields(org_id = %org_id, key_id = %key_id))]
pub async fn delete_public_key(
    State(state): State<AppState>,
    Path((org_id, key_id)): Path<(Uuid, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let actor = super::actor_id(&headers)?;
    let org_api_id = state.provisioned_org_api_id(org_id).await?;

    state
        .public_keys
        .delete_public_key(actor, org_id, &org_api_id, &key_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
