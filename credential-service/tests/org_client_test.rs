//! HTTP organization client tests against a loopback API.

use axum::{
    routing::{get, post},
    Json, Router,
};
use credential_service::config::{IdentityGatewayConfig, OrgApiConfig};
use credential_service::services::{
    org_client::{CreateOrganizationRequest, PublicKeyParams},
    HttpOrganizationClient, OrgApiError, OrganizationClient, TokenBroker,
};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::sync::Arc;

/// Loopback stand-in for the organization API plus its token endpoint.
async fn spawn_api(fail_creates: bool) -> SocketAddr {
    let app = Router::new()
        .route(
            "/token",
            post(|| async {
                Json(serde_json::json!({
                    "access_token": "gateway-token",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                }))
            }),
        )
        .route(
            "/Organization",
            post(move || async move {
                if fail_creates {
                    (
                        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                        Json(serde_json::json!({
                            "issue": [
                                {"details": {"text": "NPI already registered"}}
                            ]
                        })),
                    )
                } else {
                    (
                        axum::http::StatusCode::CREATED,
                        Json(serde_json::json!({"id": "570f7a71-0e8f-48a1-83b0-c46ac35d6ef3"})),
                    )
                }
            }),
        )
        .route(
            "/Organization/:id/public_keys",
            post(|| async {
                (
                    axum::http::StatusCode::CREATED,
                    Json(serde_json::json!({"id": "key-1", "label": "Test Key 1"})),
                )
            })
            .get(|| async {
                Json(serde_json::json!({
                    "entities": [{"id": "key-1", "label": "Test Key 1"}]
                }))
            }),
        )
        .route(
            "/Organization/:id/token",
            get(|| async {
                Json(serde_json::json!({
                    "entities": [{"id": "tok-1", "label": "Sandbox token"}]
                }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

fn client_for(addr: SocketAddr) -> HttpOrganizationClient {
    let gateway = IdentityGatewayConfig {
        token_url: format!("http://{}/token", addr),
        userinfo_url: format!("http://{}/userinfo", addr),
        client_id: "test-client-id".to_string(),
        client_secret: SecretString::new("test-client-secret".to_string()),
        timeout_seconds: 5,
    };
    let broker = Arc::new(TokenBroker::new(&gateway).expect("broker"));

    HttpOrganizationClient::new(
        &OrgApiConfig {
            base_url: format!("http://{}", addr),
            timeout_seconds: 5,
        },
        broker,
    )
    .expect("client")
}

#[tokio::test]
async fn organization_creation_round_trips() {
    let addr = spawn_api(false).await;
    let client = client_for(addr);

    let created = client
        .create_organization(&CreateOrganizationRequest {
            name: "Health Hut".to_string(),
            npi: "79927398713".to_string(),
        })
        .await
        .expect("creation should succeed");
    assert_eq!(created.id, "570f7a71-0e8f-48a1-83b0-c46ac35d6ef3");
}

#[tokio::test]
async fn non_2xx_maps_to_failure_envelope() {
    let addr = spawn_api(true).await;
    let client = client_for(addr);

    let err = client
        .create_organization(&CreateOrganizationRequest {
            name: "Health Hut".to_string(),
            npi: "79927398713".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        OrgApiError::Api(failure) => {
            assert_eq!(failure.status, 422);
            assert_eq!(failure.issues, vec!["NPI already registered".to_string()]);
        }
        other => panic!("expected failure envelope, got {:?}", other),
    }
}

#[tokio::test]
async fn public_key_registration_and_listing_round_trip() {
    let addr = spawn_api(false).await;
    let client = client_for(addr);

    let entry = client
        .create_public_key(
            "org-1",
            &PublicKeyParams {
                label: "Test Key 1".to_string(),
                public_key: "---pem---".to_string(),
                snippet_signature: "sig".to_string(),
            },
        )
        .await
        .expect("registration should succeed");
    assert_eq!(entry.id, "key-1");

    let keys = client.get_public_keys("org-1").await.expect("listing");
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].label, "Test Key 1");
}

#[tokio::test]
async fn connection_failures_map_to_connection_error() {
    let gateway = IdentityGatewayConfig {
        token_url: "http://127.0.0.1:9/token".to_string(),
        userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
        client_id: "test-client-id".to_string(),
        client_secret: SecretString::new("secret".to_string()),
        timeout_seconds: 1,
    };
    let broker = Arc::new(TokenBroker::new(&gateway).expect("broker"));
    let client = HttpOrganizationClient::new(
        &OrgApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
        },
        broker,
    )
    .expect("client");

    let err = client.get_public_keys("org-1").await.unwrap_err();
    // The broker fails first: its endpoint is equally unreachable.
    assert!(matches!(
        err,
        OrgApiError::Auth(_) | OrgApiError::Connection(_)
    ));
}
