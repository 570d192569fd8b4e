//! Password recovery.
//!
//! Three steps, each keyed by email:
//!
//! 1. `initiate` emails a 6-character recovery code.
//! 2. `exchange` trades that code for a 10-character resetting code, returned to the
//!    caller directly.
//! 3. `reset` consumes the resetting code and stores the new password.
//!
//! Only hashes of the codes are stored, and an identity holds at most one challenge
//! at a time. Starting over replaces whatever was outstanding. Concurrent attempts on
//! the same identity are last-write-wins on the challenge; the flow never writes any
//! other field except the password on reset.
use crate::error::{Error, Result};
use crate::identity::secrets::{generate_code, hash_secret, normalize_email, verify_secret};
use crate::identity::{Identity, IdentityRepository};
use crate::notifications::{DeliveryFlow, Message, NotificationPublisher};
use tracing::{info, warn};

pub const RECOVERY_CODE_LENGTH: usize = 6;
pub const RESETTING_CODE_LENGTH: usize = 10;

const NOT_INITIATED: &str = "email is not registered or recovery was not initiated";
const CODE_MISMATCH: &str = "provided code does not match";

#[derive(Clone)]
pub struct RecoveryFlow {
    identities: IdentityRepository,
    publisher: NotificationPublisher,
}

impl RecoveryFlow {
    #[must_use]
    pub fn new(identities: IdentityRepository, publisher: NotificationPublisher) -> Self {
        Self {
            identities,
            publisher,
        }
    }

    /// Email a recovery code. Unknown addresses succeed silently so callers cannot
    /// discover which emails are registered.
    ///
    /// # Errors
    /// `Internal` on storage or hashing failures.
    pub async fn initiate(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let Some(mut identity) = self.identities.find_by_email(&email).await? else {
            warn!("password recovery requested for an unknown email");
            return Ok(());
        };

        let code = generate_code(RECOVERY_CODE_LENGTH);
        identity.begin_recovery(hash_secret(&code)?);
        saved(self.identities.save_recovery(&identity).await?)?;

        let message = Message::new(
            "password_recovery",
            "Password Recovery",
            format!("Your recovery code is: {code}"),
        )
        .with_param("email", identity.email.clone());
        self.publisher
            .publish(DeliveryFlow::Email, identity.id, message)
            .await?;

        info!(identity_id = %identity.id, "password recovery initiated");
        Ok(())
    }

    /// Trade a recovery code for a resetting code.
    ///
    /// # Errors
    /// `Validation` if there is no recovery in progress for `email` or the code is
    /// wrong. A wrong code leaves the challenge untouched.
    pub async fn exchange(&self, email: &str, code: &str) -> Result<String> {
        let mut identity = self.identity(email).await?;
        let stored = identity
            .recovery_code_hash()
            .ok_or_else(|| Error::validation(NOT_INITIATED))?;
        if !verify_secret(code.trim(), stored) {
            return Err(Error::validation(CODE_MISMATCH));
        }

        let resetting_code = generate_code(RESETTING_CODE_LENGTH);
        identity.begin_resetting(hash_secret(&resetting_code)?);
        saved(self.identities.save_recovery(&identity).await?)?;

        info!(identity_id = %identity.id, "recovery code exchanged");
        Ok(resetting_code)
    }

    /// Set a new password with a resetting code and end the recovery.
    ///
    /// # Errors
    /// `Validation` if no resetting code is outstanding, the code is wrong, or the
    /// password is empty.
    pub async fn reset(&self, email: &str, code: &str, password: &str) -> Result<()> {
        let mut identity = self.identity(email).await?;
        let stored = identity
            .resetting_code_hash()
            .ok_or_else(|| Error::validation(NOT_INITIATED))?;
        if !verify_secret(code.trim(), stored) {
            return Err(Error::validation(CODE_MISMATCH));
        }
        if password.is_empty() {
            return Err(Error::validation("password is required"));
        }

        identity.set_password_hash(hash_secret(password)?);
        saved(self.identities.save_password(&identity).await?)?;
        info!(identity_id = %identity.id, "password reset");

        let message = Message::new(
            "password_changed",
            "Password Changed",
            "Your password was changed through account recovery.",
        );
        self.publisher
            .publish(DeliveryFlow::InApp, identity.id, message)
            .await?;
        Ok(())
    }

    async fn identity(&self, email: &str) -> Result<Identity> {
        self.identities
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| Error::validation(NOT_INITIATED))
    }
}

// The identity was deleted between lookup and write.
fn saved(updated: bool) -> Result<()> {
    if updated {
        Ok(())
    } else {
        Err(Error::validation(NOT_INITIATED))
    }
}
