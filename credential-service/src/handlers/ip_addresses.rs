//! IP allow-list handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::org_client::IpAddressEntry;
use crate::utils::validation::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIpAddressRequest {
    #[validate(length(min = 1, max = 25))]
    pub label: String,
    #[validate(length(min = 1))]
    pub ip_address: String,
}

#[derive(Debug, Serialize)]
pub struct IpAddressResponse {
    pub id: String,
    pub label: String,
    pub ip_address: String,
}

/// POST /organizations/{org_id}/ip_addresses
#[tracing::instrument(skip(state, headers, req), fields(org_id = %org_id))]
pub async fn create_ip_address(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<CreateIpAddressRequest>,
) -> Result<(StatusCode, Json<IpAddressResponse>), AppError> {
    let actor = super::actor_id(&headers)?;
    let org_api_id = state.provisioned_org_api_id(org_id).await?;

    let entry = state
        .ip_addresses
        .create_ip_address(actor, org_id, &org_api_id, &req.label, &req.ip_address)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IpAddressResponse {
            id: entry.id,
            label: entry.label,
            ip_address: entry.ip_address,
        }),
    ))
}

/// GET /organizations/{org_id}/ip_addresses
pub async fn list_ip_addresses(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<IpAddressEntry>>, AppError> {
    let org_api_id = state.provisioned_org_api_id(org_id).await?;
    Ok(Json(state.ip_addresses.ip_addresses(&org_api_id).await))
}

/// DELETE /organizations/{org_id}/ip_addresses/{addr_id}
#[tracing::instrument(skip(state, headers), fields(org_id = %org_id, addr_id = %addr_id))]
pub async fn delete_ip_address(
    State(state): State<AppState>,
    Path((org_id, addr_id)): Path<(Uuid, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let actor = super::actor_id(&headers)?;
    let org_api_id = state.provisioned_org_api_id(org_id).await?;

    state
        .ip_addresses
        .delete_ip_address(actor, org_id, &org_api_id, &addr_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
