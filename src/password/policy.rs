//! Complexity and expiry rules.

use chrono::{DateTime, Duration, Utc};

use super::PasswordError;
use crate::config::PasswordPolicyConfig;

/// Longest accepted `ExpirationDays` window, roughly a century.
pub const MAX_EXPIRATION_DAYS: u32 = 36_500;

/// Return every rule `password` breaks.
///
/// Length bounds always apply; character classes only when `complexity` is on.
pub fn violations(config: &PasswordPolicyConfig, complexity: bool, password: &str) -> Vec<String> {
    let mut out = Vec::new();
    let len = password.chars().count();

    if len < config.min_length || len > config.max_length {
        out.push(format!(
            "length must be between {} and {} characters",
            config.min_length, config.max_length
        ));
    }
    if password.chars().any(char::is_control) {
        out.push("control characters are not allowed".to_string());
    }

    if complexity {
        if config.require_letter && !password.chars().any(|c| c.is_ascii_alphabetic()) {
            out.push("must contain a letter".to_string());
        }
        if config.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            out.push("must contain a digit".to_string());
        }
        if config.require_special && !password.chars().any(|c| c.is_ascii_punctuation()) {
            out.push("must contain a special character".to_string());
        }
    }

    out
}

/// `now + days`, or `None` when expiry is disabled.
pub fn next_expiry(now: DateTime<Utc>, days: u32) -> Result<Option<DateTime<Utc>>, PasswordError> {
    if days == 0 {
        return Ok(None);
    }
    if days > MAX_EXPIRATION_DAYS {
        return Err(PasswordError::ExpirationOutOfRange(days));
    }
    Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_add_signed(window))
        .map(Some)
        .ok_or(PasswordError::ExpirationOutOfRange(days))
}

/// Persisted form of an expiry instant; empty means "never".
pub fn format_expiry(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_default()
}
