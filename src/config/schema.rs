//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every section has defaults so a minimal (or empty) file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the panel settings service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PanelConfig {
    /// First-boot listener settings.
    pub server: ServerConfig,

    /// Filesystem layout.
    pub paths: PathsConfig,

    /// Password complexity and expiry policy.
    pub password: PasswordPolicyConfig,

    /// TOTP enrollment defaults.
    pub mfa: MfaConfig,

    /// Self-signed certificate parameters.
    pub tls: TlsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// One-shot initialization values.
    pub bootstrap: BootstrapConfig,
}

/// Listener configuration.
///
/// `bind_address`, `port` and `ipv6` only seed the settings store on first
/// boot; afterwards the store is authoritative.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind IP (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Listening port.
    pub port: u16,

    /// Listen on IPv6 as well.
    pub ipv6: bool,

    /// Serve HTTPS. Fixed for the lifetime of the process.
    pub tls_enabled: bool,

    /// Allow ports below 1024.
    pub allow_privileged_ports: bool,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long an old listener may drain after a swap, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9999,
            ipv6: false,
            tls_enabled: true,
            allow_privileged_ports: false,
            request_timeout_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base directory for all panel state.
    pub data_dir: PathBuf,

    /// Directory holding `server.crt` / `server.key`. Defaults to `<data_dir>/secret`.
    pub secret_dir: Option<PathBuf>,

    /// Settings document. Defaults to `<data_dir>/settings.json`.
    pub settings_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/opt/panel"),
            secret_dir: None,
            settings_file: None,
        }
    }
}

impl PathsConfig {
    pub fn secret_dir(&self) -> PathBuf {
        self.secret_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("secret"))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("settings.json"))
    }
}

/// Password policy.
///
/// Character-class requirements apply while the `ComplexityVerification`
/// setting is enabled; length bounds always apply.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub require_letter: bool,
    pub require_digit: bool,
    pub require_special: bool,

    /// Seed for the `ExpirationDays` setting (0 = never expires).
    pub default_expiration_days: u32,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 30,
            require_letter: true,
            require_digit: true,
            require_special: true,
            default_expiration_days: 0,
        }
    }
}

/// TOTP defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MfaConfig {
    /// Issuer shown in authenticator apps.
    pub issuer: String,

    /// Account label encoded in the provisioning URL.
    pub account: String,

    /// Default time step in seconds.
    pub default_interval: u64,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            issuer: "Panel".to_string(),
            account: "admin".to_string(),
            default_interval: 30,
        }
    }
}

/// Self-signed certificate parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    pub common_name: String,

    /// Additional DNS names or IPs placed in the SAN extension.
    pub extra_sans: Vec<String>,

    pub self_signed_days: u32,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            common_name: "panel.local".to_string(),
            extra_sans: Vec::new(),
            self_signed_days: 3650,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Values applied only when the settings store is first initialized.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Initial admin password. A random one is generated and logged when unset.
    pub initial_password: Option<String>,
}
