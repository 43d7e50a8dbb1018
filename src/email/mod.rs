//! Outbound email collaborator. Delivery mechanics live outside this
//! core; the trait is what the service calls, and mail failures never
//! block the primary operation (they surface as an `EmailDispatch` flag
//! instead, so the UI can offer a retry).

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
#[error("Mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Whether the follow-up email for an operation actually went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDispatch {
    Sent,
    Failed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset_email<'a>(
        &self,
        email: &str,
        token: &str,
        display_name: Option<&'a str>,
    ) -> Result<(), MailError>;

    async fn send_email_verification_email<'a>(
        &self,
        email: &str,
        token: &str,
        display_name: Option<&'a str>,
    ) -> Result<(), MailError>;

    async fn send_password_changed_email<'a>(
        &self,
        email: &str,
        display_name: Option<&'a str>,
    ) -> Result<(), MailError>;
}

/// Development mailer: records the send as a tracing event. Token values
/// are not logged.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset_email<'a>(
        &self,
        email: &str,
        _token: &str,
        _display_name: Option<&'a str>,
    ) -> Result<(), MailError> {
        info!(email, "password reset email dispatched");
        Ok(())
    }

    async fn send_email_verification_email<'a>(
        &self,
        email: &str,
        _token: &str,
        _display_name: Option<&'a str>,
    ) -> Result<(), MailError> {
        info!(email, "verification email dispatched");
        Ok(())
    }

    async fn send_password_changed_email<'a>(
        &self,
        email: &str,
        _display_name: Option<&'a str>,
    ) -> Result<(), MailError> {
        info!(email, "password changed notice dispatched");
        Ok(())
    }
}
