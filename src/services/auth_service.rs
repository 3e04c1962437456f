//! Domain service for email-OTP login and signup.
//!
//! The portal never stores passwords: a short-lived 6-digit code is issued
//! per email, delivered through an [`OtpMailer`] collaborator, and consumed
//! on verification. A verified email either matches an existing user (login)
//! or requires signup first.

use thiserror::Error;

use crate::db::User;
use crate::domain::Role;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Please wait {retry_in}s before requesting a new code")]
    ResendThrottled { retry_in: i64 },

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to deliver code: {0}")]
    Delivery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result of a successful code verification.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    /// The email belongs to a known user; the caller may establish a
    /// session.
    User(User),
    /// Code was valid but no account exists for the email yet; signup is
    /// required before a session can be created.
    RegistrationRequired,
}

/// Delivery channel for issued codes. The default implementation logs the
/// code; a real deployment would plug in an email provider here.
#[async_trait::async_trait]
pub trait OtpMailer: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Logs the code instead of sending mail. Development default.
pub struct TracingMailer;

#[async_trait::async_trait]
impl OtpMailer for TracingMailer {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(email, code, "OTP issued (no mail provider configured)");
        Ok(())
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Issues a code for the email and hands it to the mailer.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ResendThrottled`] while more than 240s of the
    /// previous code's 300s window remain.
    async fn send_code(&self, email: &str) -> Result<(), AuthError>;

    /// Checks a submitted code. The code is consumed on success.
    async fn verify_code(&self, email: &str, code: &str) -> Result<VerifyOutcome, AuthError>;

    /// Creates a new user after a verified signup. Role is fixed at
    /// creation.
    async fn register(
        &self,
        email: &str,
        name: &str,
        phone: &str,
        role: Role,
    ) -> Result<User, AuthError>;

    /// Loads the user backing a session.
    async fn get_user(&self, id: i32) -> Result<User, AuthError>;
}
