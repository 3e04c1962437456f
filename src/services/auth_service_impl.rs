//! In-memory OTP issuance over the shared store.
//!
//! Issued codes never touch the database; they live in a per-process table
//! and expire after five minutes, mirroring how the original auth provider
//! behaved. User records themselves are persisted through the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::constants::otp::{EXPIRY_SECONDS, RESEND_BLOCKED_ABOVE_SECONDS};
use crate::db::{Store, User};
use crate::domain::Role;
use crate::services::auth_service::{AuthError, AuthService, OtpMailer, VerifyOutcome};

#[derive(Debug, Clone)]
struct IssuedOtp {
    code: String,
    expires_at: DateTime<Utc>,
}

pub struct SeaOrmAuthService {
    store: Store,
    mailer: Arc<dyn OtpMailer>,
    codes: Mutex<HashMap<String, IssuedOtp>>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn OtpMailer>) -> Self {
        Self {
            store,
            mailer,
            codes: Mutex::new(HashMap::new()),
        }
    }

    fn generate_code() -> String {
        let mut rng = rand::rng();
        format!("{:06}", rng.random_range(0..1_000_000u32))
    }

    fn validate_email(email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AuthError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn send_code(&self, email: &str) -> Result<(), AuthError> {
        Self::validate_email(email)?;
        let email = email.trim().to_lowercase();

        let now = Utc::now();
        let mut codes = self.codes.lock().await;

        if let Some(existing) = codes.get(&email) {
            let time_left = (existing.expires_at - now).num_seconds();
            if time_left > RESEND_BLOCKED_ABOVE_SECONDS {
                return Err(AuthError::ResendThrottled {
                    retry_in: time_left - RESEND_BLOCKED_ABOVE_SECONDS,
                });
            }
        }

        let code = Self::generate_code();
        codes.insert(
            email.clone(),
            IssuedOtp {
                code: code.clone(),
                expires_at: now + chrono::Duration::seconds(EXPIRY_SECONDS),
            },
        );
        drop(codes);

        self.mailer
            .deliver(&email, &code)
            .await
            .map_err(|e| AuthError::Delivery(e.to_string()))?;

        info!(email, "OTP sent");
        Ok(())
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<VerifyOutcome, AuthError> {
        Self::validate_email(email)?;
        let email = email.trim().to_lowercase();

        let now = Utc::now();
        let mut codes = self.codes.lock().await;

        let valid = matches!(
            codes.get(&email),
            Some(issued) if issued.code == code && issued.expires_at > now
        );

        if !valid {
            warn!(email, "OTP verification failed");
            return Err(AuthError::InvalidOtp);
        }

        // Consumed on success; a second submission of the same code fails.
        codes.remove(&email);
        drop(codes);

        match self.store.get_user_by_email(&email).await? {
            Some(user) => {
                info!(email, user_id = user.id, "OTP verified, user logged in");
                Ok(VerifyOutcome::User(user))
            }
            None => {
                info!(email, "OTP verified, signup required");
                Ok(VerifyOutcome::RegistrationRequired)
            }
        }
    }

    async fn register(
        &self,
        email: &str,
        name: &str,
        phone: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        Self::validate_email(email)?;
        if name.trim().is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }

        let email = email.trim().to_lowercase();

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user = self
            .store
            .create_user(&email, name.trim(), phone.trim(), role)
            .await?;

        info!(email, user_id = user.id, role = %role, "User registered");
        Ok(user)
    }

    async fn get_user(&self, id: i32) -> Result<User, AuthError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
