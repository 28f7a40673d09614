//! Panel TLS certificate subsystem.
//!
//! # Data Flow
//! ```text
//! load_user_certificate(cert PEM, key PEM)
//!     → material.rs (parse, validity window, key ↔ certificate match)
//!     → [live lock]
//!     → files.rs (back up, atomic replace of server.crt / server.key)
//!     → LiveControl::reload_tls (restore backup on failure)
//!     → store writes: SSLType, SSL
//! ```
//!
//! # Design Decisions
//! - Nothing touches disk or the listener until the pair fully validates
//! - The live lock is shared with the binding manager so a certificate
//!   swap never races a listener swap
//! - `SSLType` is only written after the new pair is serving

pub mod files;
pub mod manager;
pub mod material;
pub mod self_signed;

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::store::StoreError;

pub use files::CertFiles;
pub use manager::{ensure_certificate, CertificateManager};
pub use material::{CertificateInfo, CertificateSource, ValidatedPair};

#[derive(Debug, Error)]
pub enum CertError {
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("private key does not match the certificate")]
    KeyMismatch,

    #[error("certificate expired at {not_after}")]
    Expired { not_after: String },

    #[error("certificate is not valid before {not_before}")]
    NotYetValid { not_before: String },

    #[error("no certificate installed at {0}")]
    NotFound(PathBuf),

    #[error("certificate generation failed: {0}")]
    Generate(String),

    #[error("live TLS reload failed, previous certificate kept: {0}")]
    ApplyFailed(#[source] std::io::Error),

    #[error("certificate file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("certificate is serving but settings were partially updated ({committed}/{total}): {source}")]
    PartialApply {
        committed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CertError::InvalidCertificate(_)
            | CertError::InvalidKey(_)
            | CertError::Expired { .. }
            | CertError::NotYetValid { .. } => ErrorKind::Validation,
            CertError::KeyMismatch => ErrorKind::Conflict,
            CertError::NotFound(_) => ErrorKind::NotFound,
            CertError::ApplyFailed(_) => ErrorKind::ApplyFailed,
            CertError::PartialApply { .. } => ErrorKind::PartialApply,
            CertError::Generate(_) | CertError::Io(_) => ErrorKind::Internal,
            CertError::Store(e) => e.kind(),
        }
    }
}
