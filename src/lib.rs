//! Panel system settings and security configuration.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌────────────────────────────────────────────────────────┐
//!                │                  settings::SettingsService             │
//!                │ update(key, value) / proxy / terminal / MFA / certs    │
//!                └──────┬────────────┬─────────────┬─────────────┬────────┘
//!                       │            │             │             │
//!                       ▼            ▼             ▼             ▼
//!                ┌──────────┐ ┌────────────┐ ┌───────────┐ ┌─────────────┐
//!                │   mfa    │ │  password  │ │   certs   │ │ net/binding │
//!                │  (TOTP)  │ │  (Argon2)  │ │ (rustls)  │ │  (socket2)  │
//!                └────┬─────┘ └─────┬──────┘ └──┬─────┬──┘ └──┬───────┬──┘
//!                     │             │           │     └──┬────┘       │
//!                     ▼             ▼           ▼        ▼            ▼
//!                ┌────────────────────────────────┐ ┌──────────────────────┐
//!                │ store (MemoryStore | FileStore)│ │ net/live (LiveLock,  │
//!                └────────────────────────────────┘ │ axum-server + TLS)   │
//!                                                   └──────────────────────┘
//! ```

pub mod atomic_file;
pub mod certs;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mfa;
pub mod net;
pub mod observability;
pub mod password;
pub mod settings;
pub mod store;

pub use config::schema::PanelConfig;
pub use error::{ErrorKind, SettingsError, SettingsResult};
pub use settings::SettingsService;
