pub mod audit;
pub mod client_token_manager;
pub mod deliverability;
pub mod email;
pub mod error;
pub mod identity;
pub mod invitation_service;
pub mod ip_address_manager;
pub mod org_client;
pub mod organization_service;
pub mod public_key_manager;
pub mod store;
pub mod throttle;
pub mod token_broker;

pub use audit::CredentialAuditService;
pub use client_token_manager::ClientTokenManager;
pub use deliverability::{DeliverabilityChecker, MxDeliverabilityChecker, StaticDeliverability};
pub use email::{Mailer, MockMailer, SmtpMailer};
pub use error::{CredentialError, InvitationError};
pub use identity::{
    HttpUserInfoService, MockUserInfoService, UserInfoError, UserInfoService, VerifiedClaims,
};
pub use invitation_service::{
    AoInvitationAttributes, CdInvitationAttributes, InvitationService, RegistrationOutcome,
};
pub use ip_address_manager::IpAddressManager;
pub use org_client::{
    HttpOrganizationClient, MockOrganizationClient, OrgApiError, OrgApiFailure,
    OrganizationClient,
};
pub use organization_service::{OrganizationError, OrganizationService};
pub use public_key_manager::PublicKeyManager;
pub use store::{Database, InMemoryStore, PortalStore};
pub use throttle::{InMemoryThrottleStore, MailThrottle, RedisThrottleStore, ThrottleStore};
pub use token_broker::{BrokerError, TokenBroker};
