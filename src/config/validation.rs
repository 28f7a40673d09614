//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, lengths, intervals)
//! - Check that the bind address parses as an IP
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PanelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use crate::config::schema::PanelConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `server.port`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &PanelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.server.bind_address.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) if !config.server.ipv6 => errors.push(ValidationError::new(
            "server.bind_address",
            "IPv6 address requires server.ipv6 = true",
        )),
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::new(
            "server.bind_address",
            format!("{:?} is not an IP address", config.server.bind_address),
        )),
    }

    if config.server.port == 0 {
        errors.push(ValidationError::new("server.port", "port must be non-zero"));
    } else if config.server.port < 1024 && !config.server.allow_privileged_ports {
        errors.push(ValidationError::new(
            "server.port",
            "privileged port requires server.allow_privileged_ports = true",
        ));
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "timeout must be greater than zero",
        ));
    }

    let pw = &config.password;
    if pw.min_length == 0 {
        errors.push(ValidationError::new(
            "password.min_length",
            "minimum length must be at least 1",
        ));
    }
    if pw.max_length < pw.min_length {
        errors.push(ValidationError::new(
            "password.max_length",
            format!("must be >= min_length ({})", pw.min_length),
        ));
    }

    if config.mfa.default_interval == 0 {
        errors.push(ValidationError::new(
            "mfa.default_interval",
            "interval must be a positive number of seconds",
        ));
    }
    if config.mfa.issuer.contains(':') || config.mfa.account.contains(':') {
        errors.push(ValidationError::new(
            "mfa",
            "issuer and account must not contain ':'",
        ));
    }

    if config.tls.self_signed_days == 0 {
        errors.push(ValidationError::new(
            "tls.self_signed_days",
            "validity must be at least one day",
        ));
    }

    if let Some(initial) = &config.bootstrap.initial_password {
        if initial.len() < pw.min_length {
            errors.push(ValidationError::new(
                "bootstrap.initial_password",
                format!("shorter than password.min_length ({})", pw.min_length),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&PanelConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = PanelConfig::default();
        config.server.bind_address = "not-an-ip".into();
        config.server.port = 80;
        config.mfa.default_interval = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["server.bind_address", "server.port", "mfa.default_interval"]
        );
    }

    #[test]
    fn ipv6_address_needs_flag() {
        let mut config = PanelConfig::default();
        config.server.bind_address = "::".into();
        assert!(validate_config(&config).is_err());

        config.server.ipv6 = true;
        assert!(validate_config(&config).is_ok());
    }
}
