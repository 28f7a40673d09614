//! Time-based one-time codes (RFC 6238, SHA-1, 6 digits).
//!
//! Secrets are exchanged as unpadded RFC 4648 base32, which is what
//! authenticator apps expect in the provisioning URL.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::ErrorKind;

/// Digits per code.
pub const TOTP_DIGITS: usize = 6;
/// Steps accepted on either side of the current one.
pub const TOTP_SKEW: u8 = 1;
/// Raw secret size: 160 bits.
pub const SECRET_BYTES: usize = 20;

/// Account label used when only validation is needed.
const VALIDATION_LABEL: &str = "panel";

#[derive(Debug, Error)]
pub enum TotpError {
    #[error("TOTP interval must be a positive number of seconds, got {0}")]
    InvalidInterval(u64),

    #[error("TOTP secret is not usable: {0}")]
    InvalidSecret(String),

    #[error("invalid TOTP label: {0}")]
    InvalidLabel(String),

    #[error("failed to render TOTP provisioning data: {0}")]
    Provisioning(String),
}

impl TotpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TotpError::Provisioning(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

/// Freshly issued enrollment material. Nothing here has been persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSecret {
    /// Base32 secret to bind later.
    pub secret: String,
    pub interval: u64,
    /// `otpauth://totp/...` URL with issuer, account, secret and period.
    pub provisioning_url: String,
    /// Base64 PNG of the provisioning URL as a QR code.
    pub qr_image: String,
}

/// Generate a new secret and its provisioning payload.
pub fn issue(account: &str, issuer: &str, interval: u64) -> Result<IssuedSecret, TotpError> {
    if interval == 0 {
        return Err(TotpError::InvalidInterval(interval));
    }

    let mut raw = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut raw);
    let secret = match Secret::Raw(raw.to_vec()).to_encoded() {
        Secret::Encoded(s) => s,
        Secret::Raw(_) => return Err(TotpError::Provisioning("secret encoding failed".into())),
    };

    let totp = TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        interval,
        raw.to_vec(),
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| TotpError::InvalidLabel(e.to_string()))?;

    let qr_image = totp.get_qr_base64().map_err(TotpError::Provisioning)?;

    Ok(IssuedSecret {
        provisioning_url: totp.get_url(),
        secret,
        interval,
        qr_image,
    })
}

fn build(secret: &str, interval: u64) -> Result<TOTP, TotpError> {
    if interval == 0 {
        return Err(TotpError::InvalidInterval(interval));
    }
    let bytes = Secret::Encoded(secret.trim().to_string())
        .to_bytes()
        .map_err(|e| TotpError::InvalidSecret(format!("{e:?}")))?;

    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        interval,
        bytes,
        None,
        VALIDATION_LABEL.to_string(),
    )
    .map_err(|e| TotpError::InvalidSecret(e.to_string()))
}

/// Reject a secret that could never validate a code.
pub fn check_secret(secret: &str) -> Result<(), TotpError> {
    build(secret, 30).map(|_| ())
}

/// Check `code` against the current time.
pub fn validate(code: &str, interval: u64, secret: &str) -> bool {
    validate_at(code, interval, secret, unix_now())
}

/// Check `code` against the steps surrounding `unix_time`.
///
/// The comparison is constant-time per candidate step.
pub fn validate_at(code: &str, interval: u64, secret: &str, unix_time: u64) -> bool {
    let code = code.trim();
    if code.len() != TOTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if unix_time < interval.saturating_mul(u64::from(TOTP_SKEW)) {
        return false;
    }
    match build(secret, interval) {
        Ok(totp) => totp.check(code, unix_time),
        Err(e) => {
            tracing::debug!(error = %e, "TOTP validation against unusable secret");
            false
        }
    }
}

/// Compute the code for the step containing `unix_time`.
pub fn generate_at(secret: &str, interval: u64, unix_time: u64) -> Result<String, TotpError> {
    Ok(build(secret, interval)?.generate(unix_time))
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
