//! Outbound mail: invitation and credential-change notifications.
//!
//! Dispatch policy only; all sends pass the mail throttle gate upstream.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use portal_core::error::AppError;
use secrecy::ExposeSecret;
use std::time::Duration;

use crate::models::Invitation;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_ao_invitation(&self, invitation: &Invitation) -> Result<(), AppError>;
    async fn send_cd_invitation(&self, invitation: &Invitation) -> Result<(), AppError>;
    async fn send_credential_change_notice(
        &self,
        to_email: &str,
        organization_name: &str,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    mailer: SmtpTransport,
    from_email: String,
    base_url: String,
}

impl SmtpMailer {
    pub fn new(config: &crate::config::SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Mailer initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
            base_url: config.base_url.clone(),
        })
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::InternalError(e.into()))?;

        // Send email in blocking thread pool to avoid blocking async runtime
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(
                    to = %to_email,
                    subject = %subject,
                    "Email sent successfully"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e.to_string(),
                    to = %to_email,
                    "Failed to send email"
                );
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }

    fn invitation_link(&self, invitation: &Invitation) -> String {
        format!(
            "{}/organizations/{}/invitations/{}",
            self.base_url, invitation.provider_organization_id, invitation.invitation_id
        )
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_ao_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        let link = self.invitation_link(invitation);
        let body = format!(
            "You have been identified as the Authorized Official for your organization.\n\n\
            Use the link below to verify your identity and register:\n\n\
            {}\n\n\
            This invitation expires in 48 hours.",
            link
        );

        self.send_email(
            &invitation.invited_email,
            "Verify your organization",
            &body,
        )
        .await
    }

    async fn send_cd_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        let link = self.invitation_link(invitation);
        let body = format!(
            "You have been invited to manage API credentials for an organization.\n\n\
            Use the link below to verify your identity and accept:\n\n\
            {}\n\n\
            This invitation expires in 48 hours.",
            link
        );

        self.send_email(
            &invitation.invited_email,
            "Credential delegate invitation",
            &body,
        )
        .await
    }

    async fn send_credential_change_notice(
        &self,
        to_email: &str,
        organization_name: &str,
    ) -> Result<(), AppError> {
        let body = format!(
            "API credentials for {} were changed.\n\n\
            If you did not expect this, contact your Authorized Official.",
            organization_name
        );

        self.send_email(to_email, "API credentials changed", &body)
            .await
    }
}

/// Recording double for tests.
#[derive(Default)]
pub struct MockMailer {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recipients and subjects of every message sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, to: &str, subject: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), subject.to_string()));
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_ao_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        self.record(&invitation.invited_email, "ao_invitation");
        Ok(())
    }

    async fn send_cd_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        self.record(&invitation.invited_email, "cd_invitation");
        Ok(())
    }

    async fn send_credential_change_notice(
        &self,
        to_email: &str,
        _organization_name: &str,
    ) -> Result<(), AppError> {
        self.record(to_email, "credential_change");
        Ok(())
    }
}
