//! Multi-factor authentication subsystem.
//!
//! # Data Flow
//! ```text
//! issue  → totp.rs (fresh secret + provisioning URL, nothing persisted)
//! bind   → totp.rs validate → store writes:
//!            [MFAStatus=disable if re-binding] MFASecret, MFAInterval, MFAStatus=enable
//! unbind → store writes: MFAStatus=disable, MFASecret=""
//! ```
//!
//! # Design Decisions
//! - `MFAStatus=enable` is the commit flag and is always written last, so a
//!   bind interrupted between writes leaves MFA disabled
//! - A re-bind first clears the flag so the old interval never pairs with
//!   the new secret
//! - Partial writes are reported with the number of committed steps

pub mod totp;

use std::sync::Arc;

use thiserror::Error;

use crate::config::MfaConfig;
use crate::credentials::CredentialState;
use crate::error::ErrorKind;
use crate::store::{SettingKey, SettingsStore, StoreError, WriteSequence, DISABLE, ENABLE};

pub use totp::{IssuedSecret, TotpError};

#[derive(Debug, Error)]
pub enum MfaError {
    #[error(transparent)]
    Totp(#[from] TotpError),

    #[error("code is not valid")]
    InvalidCode,

    #[error("MFA is not enabled")]
    NotEnabled,

    #[error("MFA update partially applied ({committed}/{total} writes committed): {source}")]
    PartialApply {
        committed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MfaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MfaError::Totp(e) => e.kind(),
            MfaError::InvalidCode => ErrorKind::Validation,
            MfaError::NotEnabled => ErrorKind::Conflict,
            MfaError::PartialApply { .. } => ErrorKind::PartialApply,
            MfaError::Store(e) => e.kind(),
        }
    }
}

/// Binding state derived from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MfaState {
    Unbound,
    Bound { interval: u64 },
}

/// Runs the unbound → bound protocol against the settings store.
pub struct MfaManager {
    store: Arc<dyn SettingsStore>,
    config: MfaConfig,
}

impl MfaManager {
    pub fn new(store: Arc<dyn SettingsStore>, config: MfaConfig) -> Self {
        Self { store, config }
    }

    /// Issue enrollment material. `title` overrides the configured issuer.
    pub fn issue(&self, title: Option<&str>, interval: Option<u64>) -> Result<IssuedSecret, MfaError> {
        let issuer = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.config.issuer.as_str());
        let interval = interval.unwrap_or(self.config.default_interval);
        Ok(totp::issue(&self.config.account, issuer, interval)?)
    }

    /// Persist `secret` once the operator proves possession with `code`.
    pub fn bind(&self, secret: &str, code: &str, interval: u64) -> Result<(), MfaError> {
        if interval == 0 {
            return Err(TotpError::InvalidInterval(interval).into());
        }
        totp::check_secret(secret)?;

        if !totp::validate(code, interval, secret) {
            tracing::warn!(interval, "MFA bind rejected: code is not valid");
            return Err(MfaError::InvalidCode);
        }

        let mut writes = WriteSequence::new();
        if CredentialState::load(self.store.as_ref())?.mfa_status == ENABLE {
            writes = writes.push(SettingKey::MfaStatus, DISABLE);
        }
        let writes = writes
            .push(SettingKey::MfaSecret, secret.trim())
            .push(SettingKey::MfaInterval, interval.to_string())
            .push(SettingKey::MfaStatus, ENABLE);

        self.commit(writes)?;
        tracing::info!(interval, "MFA bound");
        Ok(())
    }

    /// Leave the bound state. The flag goes first so a failure after it
    /// still leaves MFA off.
    pub fn unbind(&self) -> Result<(), MfaError> {
        let writes = WriteSequence::new()
            .push(SettingKey::MfaStatus, DISABLE)
            .push(SettingKey::MfaSecret, "");
        self.commit(writes)?;
        tracing::info!("MFA unbound");
        Ok(())
    }

    pub fn state(&self) -> Result<MfaState, MfaError> {
        let creds = CredentialState::load(self.store.as_ref())?;
        Ok(match creds.mfa_interval {
            Some(interval) if creds.mfa_enabled() => MfaState::Bound { interval },
            _ => MfaState::Unbound,
        })
    }

    /// Check a login code against the committed secret.
    pub fn verify_login(&self, code: &str) -> Result<(), MfaError> {
        let creds = CredentialState::load(self.store.as_ref())?;
        let interval = match creds.mfa_interval {
            Some(interval) if creds.mfa_enabled() => interval,
            _ => return Err(MfaError::NotEnabled),
        };
        if totp::validate(code, interval, &creds.mfa_secret) {
            Ok(())
        } else {
            Err(MfaError::InvalidCode)
        }
    }

    fn commit(&self, writes: WriteSequence) -> Result<(), MfaError> {
        writes.apply(self.store.as_ref()).map_err(|f| {
            if f.committed == 0 {
                MfaError::Store(f.source)
            } else {
                MfaError::PartialApply {
                    committed: f.committed,
                    total: f.total,
                    source: f.source,
                }
            }
        })
    }
}
