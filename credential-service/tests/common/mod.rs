//! Test helpers: application state built from in-memory doubles, so the
//! suite runs without Postgres, Redis, DNS, or SMTP.

#![allow(dead_code)]

use std::sync::Arc;

use credential_service::config::{
    CredentialConfig, DatabaseConfig, Environment, IdentityGatewayConfig, MailThrottleConfig,
    OrgApiConfig, RateLimitConfig, RedisConfig, SecurityConfig, SmtpConfig,
};
use credential_service::models::{AoOrgLink, ProviderOrganization, User};
use credential_service::services::{
    ClientTokenManager, CredentialAuditService, InMemoryStore, InMemoryThrottleStore,
    InvitationService, IpAddressManager, MailThrottle, MockMailer, MockOrganizationClient,
    MockUserInfoService, OrganizationService, PortalStore, PublicKeyManager,
    StaticDeliverability, VerifiedClaims,
};
use credential_service::AppState;
use portal_core::middleware::rate_limit::create_ip_rate_limiter;
use secrecy::SecretString;
use uuid::Uuid;

pub fn create_test_config() -> CredentialConfig {
    CredentialConfig {
        common: portal_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "credential-service-test".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/credential_test".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://localhost:6379".to_string(),
        },
        identity_gateway: IdentityGatewayConfig {
            token_url: "http://localhost:9/token".to_string(),
            userinfo_url: "http://localhost:9/userinfo".to_string(),
            client_id: "test-client-id".to_string(),
            client_secret: SecretString::new("test-client-secret".to_string()),
            timeout_seconds: 5,
        },
        org_api: OrgApiConfig {
            base_url: "http://localhost:9".to_string(),
            timeout_seconds: 5,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            user: "test@example.com".to_string(),
            password: SecretString::new("test-password".to_string()),
            from_email: "no-reply@example.com".to_string(),
            base_url: "http://localhost:3100".to_string(),
        },
        mail_throttle: MailThrottleConfig {
            limit: 5,
            expiration_seconds: 300,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3100".to_string()],
        },
        rate_limit: RateLimitConfig {
            invitation_attempts: 100,
            invitation_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
    }
}

/// Test application wired from doubles, with handles to each of them.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<MockUserInfoService>,
    pub mailer: Arc<MockMailer>,
    pub org_client: Arc<MockOrganizationClient>,
}

pub struct TestAppBuilder {
    claims: VerifiedClaims,
    deliverable: bool,
    throttle: MailThrottleConfig,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            claims: bob_claims(),
            deliverable: true,
            throttle: MailThrottleConfig {
                limit: 5,
                expiration_seconds: 300,
            },
        }
    }

    pub fn with_claims(mut self, claims: VerifiedClaims) -> Self {
        self.claims = claims;
        self
    }

    pub fn with_deliverable(mut self, deliverable: bool) -> Self {
        self.deliverable = deliverable;
        self
    }

    pub fn with_throttle(mut self, limit: u32, expiration_seconds: u64) -> Self {
        self.throttle = MailThrottleConfig {
            limit,
            expiration_seconds,
        };
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(MockUserInfoService::returning(self.claims));
        let mailer = Arc::new(MockMailer::new());
        let org_client = Arc::new(MockOrganizationClient::new());

        let throttle = MailThrottle::new(Arc::new(InMemoryThrottleStore::new()), &self.throttle);

        let invitations = Arc::new(InvitationService::new(
            store.clone(),
            identity.clone(),
            mailer.clone(),
            Arc::new(StaticDeliverability(self.deliverable)),
            throttle,
        ));
        let organizations = Arc::new(OrganizationService::new(
            store.clone(),
            org_client.clone(),
        ));
        let audit = CredentialAuditService::new(store.clone());
        let public_keys = Arc::new(PublicKeyManager::new(org_client.clone(), audit.clone()));
        let client_tokens = Arc::new(ClientTokenManager::new(org_client.clone(), audit.clone()));
        let ip_addresses = Arc::new(IpAddressManager::new(org_client.clone(), audit));

        let state = AppState {
            config: create_test_config(),
            store: store.clone(),
            invitations,
            organizations,
            public_keys,
            client_tokens,
            ip_addresses,
            invitation_rate_limiter: create_ip_rate_limiter(100, 60),
            ip_rate_limiter: create_ip_rate_limiter(1000, 60),
        };

        TestApp {
            state,
            store,
            identity,
            mailer,
            org_client,
        }
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        TestAppBuilder::new().build()
    }
}

/// Verified claims matching `bob_cd_attributes`.
pub fn bob_claims() -> VerifiedClaims {
    VerifiedClaims {
        sub: "097d06f7-e9ad-4327-8db3-0ba193b7a2c2".to_string(),
        email: "bob@testy.com".to_string(),
        additional_emails: vec!["david@example.com".to_string()],
        given_name: "Bob".to_string(),
        family_name: "Hodges".to_string(),
        phone: "+1111111111".to_string(),
        pac_id: "900888888".to_string(),
    }
}

/// Seed an organization, returning its id.
pub async fn seed_organization(store: &dyn PortalStore, name: &str) -> Uuid {
    let mut org = ProviderOrganization::new(name.to_string(), "79927398713".to_string());
    org.api_organization_id = Some(Uuid::new_v4().to_string());
    store.insert_organization(&org).await.expect("insert org");
    org.organization_id
}

/// Seed a user holding an active AO link on the organization.
pub async fn seed_authorized_official(store: &dyn PortalStore, organization_id: Uuid) -> Uuid {
    let user = User::new(
        Uuid::new_v4().to_string(),
        "ao@example.com".to_string(),
        "Alice".to_string(),
        "Official".to_string(),
    );
    store.insert_user(&user).await.expect("insert user");

    let link = AoOrgLink::new(user.user_id, organization_id, None);
    store.insert_ao_org_link(&link).await.expect("insert link");

    user.user_id
}
