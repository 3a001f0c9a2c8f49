//! Client token credential handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::org_client::ClientTokenEntry;
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientTokenRequest {
    #[validate(length(min = 1, max = 25))]
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ClientTokenResponse {
    pub id: String,
    pub label: String,
    /// Returned once at creation; never retrievable again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// POST /organizations/{org_id}/client_tokens
#[tracing::instrument(skip(state, headers, req), fields(org_id = %org_id))]
pub async fn create_client_token(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreateClientTokenRequest>,
) -> Result<(StatusCode, Json<ClientTokenResponse>), AppError> {
    let actor = super::actor_id(&headers)?;
    let org_api_id = state.provisioned_org_api_id(org_id).await?;

    let entry = state
        .client_tokens
        .create_token(actor, org_id, &org_api_id, &req.label)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ClientTokenResponse {
            id: entry.id,
            label: entry.label,
            token: entry.token,
        }),
    ))
}

/// GET /organizations/{org_id}/client_tokens
pub async fn list_client_tokens(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<ClientTokenEntry>>, AppError> {
    let org_api_id = state.provisioned_org_api_id(org_id).await?;
    Ok(Json(state.client_tokens.client_tokens(&org_api_id).await))
}

/// DELETE /organizations/{org_id}/client_tokens/{token_id}
#[tracing::instrument(skip(state, headers), fields(org_id = %org_id, token_id = %token_id))]
pub async fn delete_client_token(
    State(state): State<AppState>,
    Path((org_id, token_id)): Path<(Uuid, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let actor = super::actor_id(&headers)?;
    let org_api_id = state.provisioned_org_api_id(org_id).await?;

    state
        .client_tokens
        .delete_token(actor, org_id, &org_api_id, &token_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
