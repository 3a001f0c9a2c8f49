pub mod audit_event;
pub mod invitation;
pub mod org_link;
pub mod organization;
pub mod user;

pub use audit_event::{CredentialAction, CredentialAuditEvent, CredentialType};
pub use invitation::{Invitation, InvitationStatus, InvitationType};
pub use org_link::{AoOrgLink, CdOrgLink};
pub use organization::ProviderOrganization;
pub use user::User;
