//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PanelConfig (validated, immutable)
//!     → seeds the settings store on first boot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Runtime-changeable values (port, bind address, MFA, ...) live in the
//!   settings store, not here

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BootstrapConfig, MfaConfig, ObservabilityConfig, PanelConfig, PasswordPolicyConfig,
    PathsConfig, ServerConfig, TlsConfig,
};
