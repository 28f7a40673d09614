//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PanelConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<PanelConfig, ConfigError> {
    let config: PanelConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PanelConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.mfa.default_interval, 30);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [server]
            port = 8443
            tls_enabled = false

            [paths]
            data_dir = "/var/lib/panel"

            [password]
            min_length = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8443);
        assert!(!config.server.tls_enabled);
        assert_eq!(
            config.paths.secret_dir(),
            std::path::PathBuf::from("/var/lib/panel/secret")
        );
        assert_eq!(config.password.min_length, 12);
        assert_eq!(config.password.max_length, 30);
    }

    #[test]
    fn semantic_errors_surface() {
        let err = parse_config("[server]\nport = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("server.port"));
    }
}
