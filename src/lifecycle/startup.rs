//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the settings store and seed missing defaults
//! - Set the initial panel password on first boot
//! - Generate a self-signed certificate when none is installed
//! - Bind the persisted listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::certs::{ensure_certificate, CertError, CertFiles};
use crate::config::{PanelConfig, PasswordPolicyConfig};
use crate::credentials::CredentialState;
use crate::error::SettingsError;
use crate::http::build_router;
use crate::net::binding::{read_spec, BindingError};
use crate::net::listener::{self, ListenerError};
use crate::net::{tls, LiveServer};
use crate::password::{PasswordError, PasswordManager};
use crate::settings::{seed_defaults, SettingsService};
use crate::store::{FileStore, SettingsStore, StoreError};

const SPECIALS: &[u8] = b"!@#$%^&*";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("settings store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("initial password: {0}")]
    Password(#[from] PasswordError),

    #[error("certificate: {0}")]
    Certificate(#[from] CertError),

    #[error("persisted binding: {0}")]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// A running panel listener and the facade that controls it.
pub struct Panel {
    pub service: Arc<SettingsService>,
    pub server: Arc<LiveServer>,
    pub local_addr: SocketAddr,
}

/// Open the JSON settings file named by the config.
pub fn open_store(config: &PanelConfig) -> Result<Arc<FileStore>, StartupError> {
    let path = config.paths.settings_file();
    let store = FileStore::open(&path)?;
    tracing::info!(path = %path.display(), "Settings store opened");
    Ok(Arc::new(store))
}

/// First-boot initialization. Safe to run on every start: only missing
/// values are filled in.
pub async fn initialize(config: &PanelConfig, store: &Arc<dyn SettingsStore>) -> Result<(), StartupError> {
    let seeded = seed_defaults(store.as_ref(), config)?;
    if seeded > 0 {
        tracing::info!(count = seeded, "Seeded default settings");
    }

    ensure_password(config, store).await?;

    if config.server.tls_enabled {
        let spec = read_spec(store.as_ref())?;
        let files = CertFiles::new(config.paths.secret_dir());
        ensure_certificate(store.as_ref(), &files, &config.tls, spec.address)?;
    }
    Ok(())
}

/// Initialize, then bring up the listener on the persisted binding.
pub async fn launch(config: &PanelConfig, store: Arc<dyn SettingsStore>) -> Result<Panel, StartupError> {
    initialize(config, &store).await?;

    let tls = if config.server.tls_enabled {
        let files = CertFiles::new(config.paths.secret_dir());
        Some(tls::load_tls_config(&files.cert_path(), &files.key_path()).await?)
    } else {
        None
    };

    let router = build_router(
        Duration::from_secs(config.server.request_timeout_secs),
        tls.is_some(),
    );
    let server = Arc::new(LiveServer::new(
        router,
        tls,
        Duration::from_secs(config.server.shutdown_grace_secs),
    ));

    let spec = read_spec(store.as_ref())?;
    let local_addr = server.start(listener::bind(&spec, false)?).await?;
    tracing::info!(
        address = %local_addr,
        tls = config.server.tls_enabled,
        "Panel listening"
    );

    let service = Arc::new(SettingsService::new(config, store, server.clone()));
    Ok(Panel {
        service,
        server,
        local_addr,
    })
}

async fn ensure_password(config: &PanelConfig, store: &Arc<dyn SettingsStore>) -> Result<(), StartupError> {
    if !CredentialState::load(store.as_ref())?.password_hash.is_empty() {
        return Ok(());
    }

    let passwords = PasswordManager::new(store.clone(), config.password.clone());
    match &config.bootstrap.initial_password {
        Some(password) => {
            passwords.reset(password).await?;
            tracing::info!("Initial panel password set from configuration");
        }
        None => {
            let password = random_password(&config.password);
            passwords.reset(&password).await?;
            // Printed once and kept out of the structured log.
            eprintln!("Initial panel password: {password}");
            tracing::warn!("Generated initial panel password (printed to stderr); change it after first login");
        }
    }
    Ok(())
}

/// A password that satisfies every character-class rule of `policy`.
pub fn random_password(policy: &PasswordPolicyConfig) -> String {
    let mut rng = rand::thread_rng();
    let len = 16.clamp(policy.min_length.max(3), policy.max_length.max(3));

    let mut chars: Vec<char> = vec![
        rng.gen_range(b'a'..=b'z') as char,
        rng.gen_range(b'0'..=b'9') as char,
        SPECIALS[rng.gen_range(0..SPECIALS.len())] as char,
    ];
    chars.extend((&mut rng).sample_iter(Alphanumeric).take(len - 3).map(char::from));
    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::policy;
    use crate::store::{MemoryStore, SettingKey, SettingsStoreExt};

    #[test]
    fn random_password_meets_policy() {
        let cfg = PasswordPolicyConfig::default();
        for _ in 0..20 {
            let pw = random_password(&cfg);
            assert!(policy::violations(&cfg, true, &pw).is_empty(), "{pw}");
        }
    }

    #[tokio::test]
    async fn initialize_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::default();
        config.paths.data_dir = dir.path().to_path_buf();
        config.bootstrap.initial_password = Some("Bootstrap#2024".into());
        let store: Arc<dyn SettingsStore> = Arc::new(MemoryStore::new());

        initialize(&config, &store).await.unwrap();
        let hash = store.get_key(SettingKey::Password).unwrap();
        let cert = CertFiles::new(config.paths.secret_dir()).read_cert().unwrap();

        initialize(&config, &store).await.unwrap();
        assert_eq!(store.get_key(SettingKey::Password).unwrap(), hash);
        assert_eq!(CertFiles::new(config.paths.secret_dir()).read_cert().unwrap(), cert);
        assert_eq!(store.get_key(SettingKey::SslType).unwrap(), "self");
    }
}
