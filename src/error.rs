//! Crate-level error type returned by the settings facade.
//!
//! Every subsystem has its own error enum; `SettingsError` wraps them so the
//! controller layer gets a single type, and `kind()` tells it whether the
//! failure was bad input or a server that currently cannot apply the change.

use thiserror::Error;

use crate::certs::CertError;
use crate::mfa::MfaError;
use crate::net::binding::BindingError;
use crate::password::PasswordError;
use crate::store::StoreError;

/// Coarse classification of a failure, stable across subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; no side effect was attempted.
    Validation,
    /// Missing setting or certificate.
    NotFound,
    /// Port in use or key mismatch; nothing was mutated.
    Conflict,
    /// A multi-step sequence committed some of its steps.
    PartialApply,
    /// The live swap failed after validation; previous state was restored.
    ApplyFailed,
    /// Storage or I/O failure not attributable to the input.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PartialApply => "partial_apply",
            ErrorKind::ApplyFailed => "apply_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by [`crate::settings::SettingsService`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid setting: {0}")]
    Validation(String),

    /// A composite update committed `committed` of `total` writes before failing.
    #[error("update partially applied ({committed}/{total} writes committed): {source}")]
    PartialApply {
        committed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mfa(#[from] MfaError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Certificate(#[from] CertError),

    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl SettingsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettingsError::Validation(_) => ErrorKind::Validation,
            SettingsError::PartialApply { .. } => ErrorKind::PartialApply,
            SettingsError::Store(e) => e.kind(),
            SettingsError::Mfa(e) => e.kind(),
            SettingsError::Password(e) => e.kind(),
            SettingsError::Certificate(e) => e.kind(),
            SettingsError::Binding(e) => e.kind(),
        }
    }
}

/// Result type for facade operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
