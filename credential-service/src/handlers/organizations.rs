//! Provider organization handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub npi: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub organization_id: Uuid,
    pub name: String,
    pub npi: String,
}

/// POST /organizations
#[tracing::instrument(skip(state, req))]
pub async fn create_organization(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), AppError> {
    let organization = state.organizations.create(&req.name, &req.npi).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse {
            organization_id: organization.organization_id,
            name: organization.name,
            npi: organization.npi,
        }),
    ))
}

/// GET /organizations/{org_id}
pub async fn get_organization(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrganizationResponse>, AppError> {
    let organization = state.organizations.find(org_id).await?;

    Ok(Json(OrganizationResponse {
        organization_id: organization.organization_id,
        name: organization.name,
        npi: organization.npi,
    }))
}
