//! Invitation lifecycle tests over the in-memory store and mocked
//! collaborators.

mod common;

use chrono::{Duration, Utc};
use common::{bob_claims, seed_authorized_official, seed_organization, TestApp, TestAppBuilder};
use credential_service::models::{Invitation, InvitationStatus, InvitationType};
use credential_service::services::{
    AoInvitationAttributes, CdInvitationAttributes, InvitationError, PortalStore,
};
use uuid::Uuid;

fn bob_cd_attributes() -> CdInvitationAttributes {
    CdInvitationAttributes {
        invited_given_name: "Bob".to_string(),
        invited_family_name: "Hodges".to_string(),
        phone_raw: "222-222-2222".to_string(),
        invited_email: "bob@testy.com".to_string(),
        invited_email_confirmation: "bob@testy.com".to_string(),
    }
}

async fn invite_bob(app: &TestApp, org_id: Uuid, ao_id: Uuid) -> Invitation {
    app.state
        .invitations
        .invite_credential_delegate(org_id, ao_id, bob_cd_attributes())
        .await
        .expect("invitation should be created")
}

#[tokio::test]
async fn cd_invitation_end_to_end() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    // Invite succeeds and mails the delegate.
    let invitation = invite_bob(&app, org_id, ao_id).await;
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.invitation_type, InvitationType::CredentialDelegate);
    let code = invitation.verification_code.clone().expect("cd code");
    assert_eq!(code.len(), 6);
    assert_eq!(app.mailer.sent().len(), 1);
    assert_eq!(app.mailer.sent()[0].0, "bob@testy.com");

    // Accept with matching identity claims within 48h.
    let (verified, claims) = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .expect("identity should verify");
    assert_eq!(claims.email, "bob@testy.com");
    app.state
        .invitations
        .confirm(&verified, Some(code.as_str()))
        .expect("code should match");

    let outcome = app
        .state
        .invitations
        .register(org_id, invitation.invitation_id, "access-token", Some(code.as_str()))
        .await
        .expect("registration should succeed");

    // A CD link now binds the accepting user to Health Hut.
    let link = app
        .store
        .find_cd_link_by_invitation(invitation.invitation_id)
        .await
        .unwrap()
        .expect("cd link created");
    assert_eq!(link.user_id, outcome.user.user_id);
    assert_eq!(link.provider_organization_id, org_id);

    // The invitation is accepted and its PII scrubbed.
    let stored = app
        .store
        .find_invitation(invitation.invitation_id)
        .await
        .unwrap()
        .expect("invitation still exists");
    assert_eq!(stored.status, InvitationStatus::Accepted);
    assert!(stored.invited_email.is_empty());
    assert!(stored.invited_given_name.is_empty());

    // A second acceptance attempt reports the terminal condition.
    let err = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::CdAccepted));
}

#[tokio::test]
async fn acceptance_fails_on_email_mismatch_without_creating_link() {
    let mut claims = bob_claims();
    claims.email = "c@d.com".to_string();
    claims.additional_emails.clear();

    let app = TestAppBuilder::new().with_claims(claims).build();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let invitation = invite_bob(&app, org_id, ao_id).await;

    let err = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::PiiMismatch));

    let link = app
        .store
        .find_cd_link_by_invitation(invitation.invitation_id)
        .await
        .unwrap();
    assert!(link.is_none());
}

#[tokio::test]
async fn acceptance_fails_on_name_mismatch() {
    let mut claims = bob_claims();
    claims.family_name = "Something Else".to_string();

    let app = TestAppBuilder::new().with_claims(claims).build();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let invitation = invite_bob(&app, org_id, ao_id).await;

    let err = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::PiiMismatch));
}

#[tokio::test]
async fn expired_cd_invitation_cannot_be_accepted() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let mut invitation = invite_bob(&app, org_id, ao_id).await;

    // Age the stored record past the 48-hour window.
    invitation.created_at = Utc::now() - Duration::hours(49);
    app.store.replace_invitation(&invitation);

    let err = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::CdExpired));

    let stored = app
        .store
        .find_invitation(invitation.invitation_id)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.status, InvitationStatus::Accepted);
}

#[tokio::test]
async fn expired_ao_invitation_reports_ao_expired_and_renews() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;

    let mut invitation = app
        .state
        .invitations
        .invite_authorized_official(
            org_id,
            AoInvitationAttributes {
                invited_given_name: String::new(),
                invited_family_name: String::new(),
                invited_email: "ao@testy.com".to_string(),
                invited_email_confirmation: "ao@testy.com".to_string(),
            },
        )
        .await
        .expect("ao invitation");

    invitation.created_at = Utc::now() - Duration::hours(49);
    app.store.replace_invitation(&invitation);

    let err = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::AoExpired));

    // Renewal issues a fresh invitation and retires the old record.
    let replacement = app
        .state
        .invitations
        .renew(org_id, invitation.invitation_id)
        .await
        .expect("renewal");
    assert_ne!(replacement.invitation_id, invitation.invitation_id);
    assert_eq!(replacement.invited_email, "ao@testy.com");

    let old = app
        .store
        .find_invitation(invitation.invitation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.status, InvitationStatus::Renewed);
}

#[tokio::test]
async fn cd_invitations_cannot_be_renewed() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let mut invitation = invite_bob(&app, org_id, ao_id).await;
    invitation.created_at = Utc::now() - Duration::hours(49);
    app.store.replace_invitation(&invitation);

    let err = app
        .state
        .invitations
        .renew(org_id, invitation.invitation_id)
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::RenewalRefused));
}

#[tokio::test]
async fn wrong_verification_code_is_rejected() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let invitation = invite_bob(&app, org_id, ao_id).await;

    let err = app
        .state
        .invitations
        .register(org_id, invitation.invitation_id, "access-token", Some("badcode"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::CodeMismatch));
}

#[tokio::test]
async fn validation_failures_create_nothing_and_send_nothing() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let mut attrs = bob_cd_attributes();
    attrs.invited_given_name = String::new();
    attrs.invited_email_confirmation = "robert@example.com".to_string();

    let err = app
        .state
        .invitations
        .invite_credential_delegate(org_id, ao_id, attrs)
        .await
        .unwrap_err();

    match err {
        InvitationError::Validation(errors) => {
            let fields = errors.field_errors();
            assert!(fields.contains_key("invited_given_name"));
            assert!(fields.contains_key("invited_email_confirmation"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn undeliverable_email_fails_validation() {
    let app = TestAppBuilder::new().with_deliverable(false).build();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let err = app
        .state
        .invitations
        .invite_credential_delegate(org_id, ao_id, bob_cd_attributes())
        .await
        .unwrap_err();

    match err {
        InvitationError::Validation(errors) => {
            assert!(errors.field_errors().contains_key("invited_email"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_ao_cannot_invite_credential_delegates() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;

    let err = app
        .state
        .invitations
        .invite_credential_delegate(org_id, Uuid::new_v4(), bob_cd_attributes())
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::NotAuthorized));
}

#[tokio::test]
async fn throttled_invitations_are_created_but_not_mailed() {
    let app = TestAppBuilder::new().with_throttle(1, 300).build();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let first = invite_bob(&app, org_id, ao_id).await;
    let second = invite_bob(&app, org_id, ao_id).await;
    assert_ne!(first.invitation_id, second.invitation_id);

    // Creation succeeded twice; only the first send passed the gate.
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn gateway_failure_surfaces_as_server_error() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let invitation = invite_bob(&app, org_id, ao_id).await;

    app.identity.set_response(Err(
        credential_service::services::UserInfoError::Gateway("yikes".to_string()),
    ));

    let err = app
        .state
        .invitations
        .verify_identity(org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::ServerError(_)));
}

#[tokio::test]
async fn invitation_under_wrong_organization_is_invalid() {
    let app = TestApp::spawn();
    let org_id = seed_organization(app.store.as_ref(), "Health Hut").await;
    let other_org_id = seed_organization(app.store.as_ref(), "Other Org").await;
    let ao_id = seed_authorized_official(app.store.as_ref(), org_id).await;

    let invitation = invite_bob(&app, org_id, ao_id).await;

    let err = app
        .state
        .invitations
        .verify_identity(other_org_id, invitation.invitation_id, "access-token")
        .await
        .unwrap_err();
    assert!(matches!(err, InvitationError::Invalid));
}
