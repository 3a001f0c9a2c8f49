use credential_service::{
    build_router,
    config::CredentialConfig,
    services::{
        ClientTokenManager, CredentialAuditService, Database, HttpOrganizationClient,
        HttpUserInfoService, InvitationService, IpAddressManager, MailThrottle,
        MxDeliverabilityChecker, OrganizationService, PublicKeyManager, RedisThrottleStore,
        SmtpMailer, TokenBroker,
    },
    AppState,
};
use portal_core::middleware::rate_limit::create_ip_rate_limiter;
use portal_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), portal_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = CredentialConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting credential service"
    );

    // Initialize database connection
    tracing::info!("Initializing database connection");
    let pool = credential_service::db::create_pool(&config.database)
        .await
        .map_err(|e| portal_core::error::AppError::DatabaseError(anyhow::anyhow!(e)))?;
    let store = Arc::new(Database::new(pool));
    tracing::info!("Database initialized successfully");

    // Throttle counters live in Redis so concurrent instances share them
    let throttle_store = Arc::new(RedisThrottleStore::new(&config.redis).await?);
    let throttle = MailThrottle::new(throttle_store, &config.mail_throttle);
    tracing::info!("Mail throttle initialized");

    // External collaborators
    let broker = Arc::new(TokenBroker::new(&config.identity_gateway).map_err(|e| {
        portal_core::error::AppError::ConfigError(anyhow::anyhow!("Token broker: {}", e))
    })?);
    let org_client = Arc::new(
        HttpOrganizationClient::new(&config.org_api, broker).map_err(|e| {
            portal_core::error::AppError::ConfigError(anyhow::anyhow!("Organization client: {}", e))
        })?,
    );
    let identity = Arc::new(HttpUserInfoService::new(&config.identity_gateway).map_err(|e| {
        portal_core::error::AppError::ConfigError(anyhow::anyhow!("Userinfo service: {}", e))
    })?);
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let deliverability = Arc::new(MxDeliverabilityChecker::from_system_conf()?);
    tracing::info!("External clients initialized");

    // Domain services
    let audit = CredentialAuditService::new(store.clone());
    let invitations = Arc::new(InvitationService::new(
        store.clone(),
        identity,
        mailer,
        deliverability,
        throttle,
    ));
    let organizations = Arc::new(OrganizationService::new(store.clone(), org_client.clone()));
    let public_keys = Arc::new(PublicKeyManager::new(org_client.clone(), audit.clone()));
    let client_tokens = Arc::new(ClientTokenManager::new(org_client.clone(), audit.clone()));
    let ip_addresses = Arc::new(IpAddressManager::new(org_client, audit));

    // Rate limiters
    let invitation_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.invitation_attempts,
        config.rate_limit.invitation_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Invitation and Global IP");

    // Create application state
    let state = AppState {
        config: config.clone(),
        store,
        invitations,
        organizations,
        public_keys,
        client_tokens,
        ip_addresses,
        invitation_rate_limiter,
        ip_rate_limiter,
    };

    // Build application router
    let app = build_router(state).await?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
