pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use portal_core::error::AppError;
use portal_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::CredentialConfig;
use crate::services::{
    ClientTokenManager, InvitationService, IpAddressManager, OrganizationService, PortalStore,
    PublicKeyManager,
};

#[derive(Clone)]
pub struct AppState {
    pub config: CredentialConfig,
    pub store: Arc<dyn PortalStore>,
    pub invitations: Arc<InvitationService>,
    pub organizations: Arc<OrganizationService>,
    pub public_keys: Arc<PublicKeyManager>,
    pub client_tokens: Arc<ClientTokenManager>,
    pub ip_addresses: Arc<IpAddressManager>,
    pub invitation_rate_limiter: portal_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: portal_core::middleware::rate_limit::IpRateLimiter,
}

impl AppState {
    /// External API id of an organization that has completed provisioning.
    pub async fn provisioned_org_api_id(&self, organization_id: Uuid) -> Result<String, AppError> {
        let organization = self
            .store
            .find_organization(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

        organization.api_organization_id.ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Organization has not been provisioned with the API"
            ))
        })
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Invitation creation burns mail quota; it gets its own limiter.
    let invitation_limiter = state.invitation_rate_limiter.clone();
    let invitation_create_routes = Router::new()
        .route(
            "/organizations/:org_id/credential_delegate_invitations",
            post(handlers::invitations::create_cd_invitation),
        )
        .route(
            "/organizations/:org_id/authorized_official_invitations",
            post(handlers::invitations::create_ao_invitation),
        )
        .layer(from_fn_with_state(
            invitation_limiter,
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/organizations", post(handlers::organizations::create_organization))
        .route(
            "/organizations/:org_id",
            get(handlers::organizations::get_organization),
        )
        .merge(invitation_create_routes)
        .route(
            "/organizations/:org_id/invitations/:invitation_id/accept",
            post(handlers::invitations::accept_invitation),
        )
        .route(
            "/organizations/:org_id/invitations/:invitation_id/confirm",
            post(handlers::invitations::confirm_invitation),
        )
        .route(
            "/organizations/:org_id/invitations/:invitation_id/register",
            post(handlers::invitations::register_invitation),
        )
        .route(
            "/organizations/:org_id/invitations/:invitation_id/renew",
            post(handlers::invitations::renew_invitation),
        )
        .route(
            "/organizations/:org_id/public_keys",
            post(handlers::public_keys::create_public_key)
                .get(handlers::public_keys::list_public_keys),
        )
        .route(
            "/organizations/:org_id/public_keys/:key_id",
            delete(handlers::public_keys::delete_public_key),
        )
        .route(
            "/organizations/:org_id/client_tokens",
            post(handlers::client_tokens::create_client_token)
                .get(handlers::client_tokens::list_client_tokens),
        )
        .route(
            "/organizations/:org_id/client_tokens/:token_id",
            delete(handlers::client_tokens::delete_client_token),
        )
        .route(
            "/organizations/:org_id/ip_addresses",
            post(handlers::ip_addresses::create_ip_address)
                .get(handlers::ip_addresses::list_ip_addresses),
        )
        .route(
            "/organizations/:org_id/ip_addresses/:addr_id",
            delete(handlers::ip_addresses::delete_ip_address),
        )
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                axum::http::HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::HeaderName::from_static("x-user-id"),
                    axum::http::header::HeaderName::from_static("x-request-id"),
                ]),
        );

    Ok(app)
}

/// Service health check
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        e
    })?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    })))
}
