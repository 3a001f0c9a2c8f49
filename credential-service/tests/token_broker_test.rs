//! Token broker tests against a loopback token endpoint.

use axum::{routing::post, Json, Router};
use credential_service::config::IdentityGatewayConfig;
use credential_service::services::{BrokerError, TokenBroker};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct TokenEndpoint {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

/// Spawn a loopback token endpoint issuing sequential tokens with the
/// given lifetime; `status` controls the response code.
async fn spawn_token_endpoint(expires_in: u64, status: u16) -> TokenEndpoint {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();

    let app = Router::new().route(
        "/token",
        post(move || {
            let hits = hits_clone.clone();
            async move {
                let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                let body = serde_json::json!({
                    "access_token": format!("token-{}", n),
                    "token_type": "Bearer",
                    "expires_in": expires_in,
                });
                (
                    axum::http::StatusCode::from_u16(status).unwrap(),
                    Json(body),
                )
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TokenEndpoint { addr, hits }
}

fn broker_config(addr: SocketAddr) -> IdentityGatewayConfig {
    IdentityGatewayConfig {
        token_url: format!("http://{}/token", addr),
        userinfo_url: format!("http://{}/userinfo", addr),
        client_id: "test-client-id".to_string(),
        client_secret: SecretString::new("test-client-secret".to_string()),
        timeout_seconds: 5,
    }
}

#[tokio::test]
async fn token_is_fetched_once_and_cached() {
    let endpoint = spawn_token_endpoint(3600, 200).await;
    let broker = TokenBroker::new(&broker_config(endpoint.addr)).expect("broker");

    let first = broker.get_token().await.expect("first fetch");
    let second = broker.get_token().await.expect("cached fetch");

    assert_eq!(first, "token-1");
    assert_eq!(second, "token-1");
    assert_eq!(endpoint.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn token_refreshes_before_expiry() {
    // 31s lifetime minus the 30s refresh margin leaves a ~1s cache.
    let endpoint = spawn_token_endpoint(31, 200).await;
    let broker = TokenBroker::new(&broker_config(endpoint.addr)).expect("broker");

    let first = broker.get_token().await.expect("first fetch");
    assert_eq!(first, "token-1");

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let refreshed = broker.get_token().await.expect("refreshed fetch");
    assert_eq!(refreshed, "token-2");
    assert_eq!(endpoint.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn error_status_surfaces_as_broker_error() {
    let endpoint = spawn_token_endpoint(3600, 500).await;
    let broker = TokenBroker::new(&broker_config(endpoint.addr)).expect("broker");

    let err = broker.get_token().await.unwrap_err();
    assert!(matches!(err, BrokerError::Status(status) if status.as_u16() == 500));
}

#[tokio::test]
async fn unreachable_endpoint_surfaces_as_broker_error() {
    let config = IdentityGatewayConfig {
        token_url: "http://127.0.0.1:9/token".to_string(),
        userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
        client_id: "test-client-id".to_string(),
        client_secret: SecretString::new("secret".to_string()),
        timeout_seconds: 1,
    };
    let broker = TokenBroker::new(&config).expect("broker");

    let err = broker.get_token().await.unwrap_err();
    assert!(matches!(err, BrokerError::Request(_)));
}
