//! Login password policy.
//!
//! # Data Flow
//! ```text
//! change_password / handle_expired_reset
//!     → verify old against stored Argon2 hash
//!     → policy.rs (length + character classes)
//!     → store writes: Password, PasswordExpireAt
//! ```
//!
//! # Design Decisions
//! - The expired-password path still demands the old password
//! - `PasswordExpireAt = change time + ExpirationDays`; empty when the window is 0
//! - Hashing runs on the blocking pool

pub mod hash;
pub mod policy;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::PasswordPolicyConfig;
use crate::credentials::CredentialState;
use crate::error::ErrorKind;
use crate::store::{SettingKey, SettingsStore, SettingsStoreExt, StoreError, WriteSequence};

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("old password is incorrect")]
    InvalidOldPassword,

    #[error("password does not meet policy: {}", .0.join("; "))]
    PolicyViolation(Vec<String>),

    #[error("expiration window of {0} days is out of range (max {max})", max = policy::MAX_EXPIRATION_DAYS)]
    ExpirationOutOfRange(u32),

    #[error("no password has been initialized")]
    NotInitialized,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("password update partially applied ({committed}/{total} writes committed): {source}")]
    PartialApply {
        committed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PasswordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PasswordError::InvalidOldPassword
            | PasswordError::PolicyViolation(_)
            | PasswordError::ExpirationOutOfRange(_) => ErrorKind::Validation,
            PasswordError::NotInitialized => ErrorKind::NotFound,
            PasswordError::Hash(_) => ErrorKind::Internal,
            PasswordError::PartialApply { .. } => ErrorKind::PartialApply,
            PasswordError::Store(e) => e.kind(),
        }
    }
}

/// Owns the `Password`, `PasswordExpireAt` and `ExpirationDays` settings.
pub struct PasswordManager {
    store: Arc<dyn SettingsStore>,
    policy: PasswordPolicyConfig,
}

impl PasswordManager {
    pub fn new(store: Arc<dyn SettingsStore>, policy: PasswordPolicyConfig) -> Self {
        Self { store, policy }
    }

    pub async fn change_password(&self, old: &str, new: &str) -> Result<(), PasswordError> {
        self.replace(old, new, Utc::now()).await?;
        tracing::info!("Panel password changed");
        Ok(())
    }

    /// Rotation forced by an expired password. Same proof of identity as a
    /// normal change, and the new password must differ from the old one.
    pub async fn handle_expired_reset(&self, old: &str, new: &str) -> Result<(), PasswordError> {
        if old == new {
            return Err(PasswordError::PolicyViolation(vec![
                "new password must differ from the expired one".to_string(),
            ]));
        }
        self.replace(old, new, Utc::now()).await?;
        tracing::info!("Expired panel password replaced");
        Ok(())
    }

    /// Verify `password` against the stored hash.
    pub async fn verify(&self, password: &str) -> Result<bool, PasswordError> {
        let stored = self.stored_hash()?;
        hash::verify_password_blocking(password.to_string(), stored).await
    }

    /// Set the password without proof of the old one. Bootstrap and local
    /// recovery only.
    pub async fn reset(&self, new: &str) -> Result<(), PasswordError> {
        self.check_policy(new)?;
        let hashed = hash::hash_password_blocking(new.to_string()).await?;
        self.commit(&hashed, Utc::now())?;
        tracing::warn!("Panel password reset without old password");
        Ok(())
    }

    /// Store a new expiry window and recompute `PasswordExpireAt` from `now`.
    pub fn set_expiration_days(&self, days: u32, now: DateTime<Utc>) -> Result<(), PasswordError> {
        let expire_at = policy::format_expiry(policy::next_expiry(now, days)?);
        WriteSequence::new()
            .push(SettingKey::ExpirationDays, days.to_string())
            .push(SettingKey::PasswordExpireAt, expire_at)
            .apply(self.store.as_ref())
            .map_err(partial)?;
        tracing::info!(days, "Password expiration window updated");
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> Result<bool, PasswordError> {
        Ok(CredentialState::load(self.store.as_ref())?.password_expired(now))
    }

    async fn replace(&self, old: &str, new: &str, now: DateTime<Utc>) -> Result<(), PasswordError> {
        let stored = self.stored_hash()?;
        if !hash::verify_password_blocking(old.to_string(), stored).await? {
            tracing::warn!("Password change rejected: old password mismatch");
            return Err(PasswordError::InvalidOldPassword);
        }
        self.check_policy(new)?;

        let hashed = hash::hash_password_blocking(new.to_string()).await?;
        self.commit(&hashed, now)
    }

    fn check_policy(&self, candidate: &str) -> Result<(), PasswordError> {
        let complexity = self.store.get_flag(SettingKey::ComplexityVerification)?;
        let problems = policy::violations(&self.policy, complexity, candidate);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(PasswordError::PolicyViolation(problems))
        }
    }

    fn stored_hash(&self) -> Result<String, PasswordError> {
        match self.store.get_key(SettingKey::Password) {
            Ok(hash) if !hash.is_empty() => Ok(hash),
            Ok(_) | Err(StoreError::NotFound(_)) => Err(PasswordError::NotInitialized),
            Err(e) => Err(e.into()),
        }
    }

    fn commit(&self, hashed: &str, now: DateTime<Utc>) -> Result<(), PasswordError> {
        let days = match self.store.get_u64(SettingKey::ExpirationDays) {
            Ok(days) if days > u64::from(policy::MAX_EXPIRATION_DAYS) => {
                tracing::warn!(days, "Stored expiration window out of range; clamping");
                policy::MAX_EXPIRATION_DAYS
            }
            Ok(days) => u32::try_from(days).unwrap_or(policy::MAX_EXPIRATION_DAYS),
            Err(StoreError::NotFound(_)) => self.policy.default_expiration_days,
            Err(e) => return Err(e.into()),
        };
        let expire_at = policy::format_expiry(policy::next_expiry(now, days)?);

        WriteSequence::new()
            .push(SettingKey::Password, hashed)
            .push(SettingKey::PasswordExpireAt, expire_at)
            .apply(self.store.as_ref())
            .map_err(partial)
    }
}

fn partial(f: crate::store::SequenceFailure) -> PasswordError {
    if f.committed == 0 {
        PasswordError::Store(f.source)
    } else {
        PasswordError::PartialApply {
            committed: f.committed,
            total: f.total,
            source: f.source,
        }
    }
}
