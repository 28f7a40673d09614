//! Settings facade.
//!
//! # Data Flow
//! ```text
//! update(key, value)
//!     → update.rs SettingUpdate::parse (closed variant per known key)
//!     → Port | BindAddress | Ipv6      → net::BindingManager
//!     → DisableMfa                     → mfa::MfaManager::unbind
//!     → ExpirationDays                 → password::PasswordManager
//!     → Plain | Passthrough            → SettingsStore::set
//!
//! update_proxy / update_terminal
//!     → typed request validated as a whole
//!     → one WriteSequence (partial failures reported, not undone)
//! ```
//!
//! # Design Decisions
//! - Credential and TLS keys are only reachable through their dedicated
//!   operations, never through the generic update
//! - Every operation returns `SettingsError` whose `kind()` survives to the
//!   caller
//! - One `LiveLock` is shared by the certificate and binding managers

pub mod proxy;
pub mod terminal;
pub mod update;

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use chrono::Utc;

use crate::certs::{CertFiles, CertificateInfo, CertificateManager};
use crate::config::PanelConfig;
use crate::credentials::CredentialState;
use crate::error::{SettingsError, SettingsResult};
use crate::mfa::{IssuedSecret, MfaManager, MfaState};
use crate::net::{BindInfo, BindSpec, BindingManager, InterfaceAddr, LiveControl, LiveLock};
use crate::password::PasswordManager;
use crate::store::{
    flag_value, SequenceFailure, SettingKey, SettingsStore, StoreError, WriteSequence,
};

pub use proxy::{ProxyKind, ProxyUpdate};
pub use terminal::{CursorStyle, TerminalInfo};
pub use update::SettingUpdate;

/// Entry point for every settings change.
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    mfa: MfaManager,
    passwords: PasswordManager,
    certs: CertificateManager,
    binding: BindingManager,
}

impl SettingsService {
    pub fn new(
        config: &PanelConfig,
        store: Arc<dyn SettingsStore>,
        live: Arc<dyn LiveControl>,
    ) -> Self {
        let lock = LiveLock::new();
        Self {
            mfa: MfaManager::new(store.clone(), config.mfa.clone()),
            passwords: PasswordManager::new(store.clone(), config.password.clone()),
            certs: CertificateManager::new(
                store.clone(),
                CertFiles::new(config.paths.secret_dir()),
                live.clone(),
                lock.clone(),
                config.tls.clone(),
            ),
            binding: BindingManager::new(
                store.clone(),
                live,
                lock,
                config.server.allow_privileged_ports,
            ),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub fn passwords(&self) -> &PasswordManager {
        &self.passwords
    }

    // --- generic settings ---

    /// Every stored setting with secret values blanked.
    pub fn setting_info(&self) -> SettingsResult<BTreeMap<String, String>> {
        Ok(self
            .store
            .entries()?
            .into_iter()
            .map(|(key, value)| {
                let secret = SettingKey::parse(&key).is_some_and(|k| k.is_secret());
                (key, if secret { String::new() } else { value })
            })
            .collect())
    }

    /// Read one non-secret setting.
    pub fn get(&self, key: &str) -> SettingsResult<String> {
        if SettingKey::parse(key).is_some_and(|k| k.is_secret()) {
            return Err(SettingsError::Validation(format!("{key} is not readable")));
        }
        Ok(self.store.get(key)?)
    }

    pub async fn update(&self, key: &str, value: &str) -> SettingsResult<()> {
        let update = SettingUpdate::parse(key, value)
            .inspect_err(|e| tracing::warn!(key, error = %e, "Setting update rejected"))?;

        match update {
            SettingUpdate::Port(port) => {
                self.binding.update_port(port).await?;
            }
            SettingUpdate::BindAddress(address) => {
                let mut info = BindInfo::from(self.binding.current()?);
                info.bind_address = address.to_string();
                info.ipv6 = info.ipv6 || address.is_ipv6();
                self.binding.update_binding(info).await?;
            }
            SettingUpdate::Ipv6(on) => {
                let current = self.binding.current()?;
                let address = match current.address {
                    IpAddr::V6(v6) if !on && v6.is_unspecified() => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    other => other,
                };
                self.binding
                    .update_binding(BindInfo::from(BindSpec {
                        address,
                        ipv6: on,
                        ..current
                    }))
                    .await?;
            }
            SettingUpdate::DisableMfa => self.mfa.unbind()?,
            SettingUpdate::ExpirationDays(days) => {
                self.passwords.set_expiration_days(days, Utc::now())?
            }
            SettingUpdate::Plain { key, value } => {
                self.store.set(key.as_str(), &value)?;
                tracing::info!(key = %key, "Setting updated");
            }
            SettingUpdate::Passthrough { key, value } => {
                self.store.set(&key, &value)?;
                tracing::info!(key = %key, "Setting updated");
            }
        }
        Ok(())
    }

    pub fn update_proxy(&self, request: ProxyUpdate) -> SettingsResult<()> {
        let kind = request.proxy_type.clone();
        request
            .into_writes()?
            .apply(self.store.as_ref())
            .map_err(sequence_error)?;
        tracing::info!(proxy_type = %kind, "Proxy settings updated");
        Ok(())
    }

    pub fn terminal_info(&self) -> SettingsResult<TerminalInfo> {
        Ok(TerminalInfo::load(self.store.as_ref())?)
    }

    pub fn update_terminal(&self, info: TerminalInfo) -> SettingsResult<()> {
        info.into_writes()?
            .apply(self.store.as_ref())
            .map_err(sequence_error)?;
        tracing::info!("Terminal settings updated");
        Ok(())
    }

    // --- password ---

    pub async fn change_password(&self, old: &str, new: &str) -> SettingsResult<()> {
        Ok(self.passwords.change_password(old, new).await?)
    }

    pub async fn handle_expired_password(&self, old: &str, new: &str) -> SettingsResult<()> {
        Ok(self.passwords.handle_expired_reset(old, new).await?)
    }

    pub fn credential_state(&self) -> SettingsResult<CredentialState> {
        Ok(CredentialState::load(self.store.as_ref())?)
    }

    // --- MFA ---

    pub fn issue_mfa(&self, title: Option<&str>, interval: Option<u64>) -> SettingsResult<IssuedSecret> {
        Ok(self.mfa.issue(title, interval)?)
    }

    pub fn bind_mfa(&self, secret: &str, code: &str, interval: u64) -> SettingsResult<()> {
        Ok(self.mfa.bind(secret, code, interval)?)
    }

    pub fn unbind_mfa(&self) -> SettingsResult<()> {
        Ok(self.mfa.unbind()?)
    }

    pub fn mfa_state(&self) -> SettingsResult<MfaState> {
        Ok(self.mfa.state()?)
    }

    pub fn verify_mfa_login(&self, code: &str) -> SettingsResult<()> {
        Ok(self.mfa.verify_login(code)?)
    }

    // --- certificates ---

    pub async fn load_user_certificate(&self, cert_pem: &[u8], key_pem: &[u8]) -> SettingsResult<CertificateInfo> {
        Ok(self.certs.load_user_certificate(cert_pem, key_pem).await?)
    }

    pub async fn regenerate_self_signed(&self) -> SettingsResult<CertificateInfo> {
        let address = self.binding.current()?.address;
        Ok(self.certs.regenerate_self_signed(address).await?)
    }

    pub fn export_certificate(&self) -> SettingsResult<Vec<u8>> {
        Ok(self.certs.export_certificate()?)
    }

    pub fn describe_certificate(&self) -> SettingsResult<CertificateInfo> {
        Ok(self.certs.describe_certificate()?)
    }

    // --- binding ---

    /// Host addresses the panel can be bound to.
    pub fn interface_addresses(&self) -> SettingsResult<Vec<InterfaceAddr>> {
        Ok(self.binding.interface_addresses()?)
    }

    pub fn current_binding(&self) -> SettingsResult<BindInfo> {
        Ok(BindInfo::from(self.binding.current()?))
    }

    pub async fn update_binding(&self, info: BindInfo) -> SettingsResult<SocketAddr> {
        Ok(self.binding.update_binding(info).await?)
    }

    pub async fn update_port(&self, port: u16) -> SettingsResult<SocketAddr> {
        Ok(self.binding.update_port(port).await?)
    }
}

fn sequence_error(f: SequenceFailure) -> SettingsError {
    if f.committed == 0 {
        SettingsError::Store(f.source)
    } else {
        SettingsError::PartialApply {
            committed: f.committed,
            total: f.total,
            source: f.source,
        }
    }
}

/// Seed every missing catalog key with its default.
pub fn seed_defaults(store: &dyn SettingsStore, config: &PanelConfig) -> SettingsResult<usize> {
    let mut writes = WriteSequence::new();
    for key in SettingKey::ALL {
        match store.get(key.as_str()) {
            Ok(_) => continue,
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let value = match key {
            SettingKey::ServerPort => config.server.port.to_string(),
            SettingKey::BindAddress => config.server.bind_address.clone(),
            SettingKey::Ipv6 => flag_value(config.server.ipv6).to_string(),
            SettingKey::ExpirationDays => config.password.default_expiration_days.to_string(),
            SettingKey::MfaInterval => config.mfa.default_interval.to_string(),
            SettingKey::Ssl => flag_value(config.server.tls_enabled).to_string(),
            other => match other.static_default() {
                Some(value) => value.to_string(),
                None => continue,
            },
        };
        writes = writes.push(key, value);
    }

    let count = writes.len();
    writes.apply(store).map_err(|f| SettingsError::PartialApply {
        committed: f.committed,
        total: f.total,
        source: f.source,
    })?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::OfflineControl;
    use crate::store::{MemoryStore, SettingsStoreExt};

    fn service() -> (Arc<MemoryStore>, SettingsService) {
        let store = Arc::new(MemoryStore::new());
        let config = PanelConfig::default();
        seed_defaults(store.as_ref(), &config).unwrap();
        let svc = SettingsService::new(&config, store.clone(), Arc::new(OfflineControl::new(true)));
        (store, svc)
    }

    #[test]
    fn seeding_is_idempotent_and_skips_password() {
        let store = MemoryStore::new();
        let config = PanelConfig::default();
        let first = seed_defaults(&store, &config).unwrap();
        assert!(first > 0);
        assert_eq!(seed_defaults(&store, &config).unwrap(), 0);
        assert!(store.get_key(SettingKey::Password).is_err());
        assert_eq!(store.get_key(SettingKey::ServerPort).unwrap(), "9999");
    }

    #[tokio::test]
    async fn plain_and_passthrough_updates() {
        let (store, svc) = service();
        svc.update("Theme", "dark").await.unwrap();
        svc.update("CustomBanner", "hello").await.unwrap();
        assert_eq!(store.get_key(SettingKey::Theme).unwrap(), "dark");
        assert_eq!(store.get("CustomBanner").unwrap(), "hello");
    }

    #[tokio::test]
    async fn secrets_are_redacted() {
        let (store, svc) = service();
        store.set_key(SettingKey::MfaSecret, "JBSWY3DPEHPK3PXP").unwrap();
        let info = svc.setting_info().unwrap();
        assert_eq!(info["MFASecret"], "");
        assert_eq!(info["Theme"], "light");
        assert!(svc.get("MFASecret").is_err());
    }

    #[tokio::test]
    async fn expiration_days_recompute_expiry() {
        let (store, svc) = service();
        svc.update("ExpirationDays", "15").await.unwrap();
        assert_eq!(store.get_key(SettingKey::ExpirationDays).unwrap(), "15");
        assert!(!store.get_key(SettingKey::PasswordExpireAt).unwrap().is_empty());

        svc.update("ExpirationDays", "0").await.unwrap();
        assert_eq!(store.get_key(SettingKey::PasswordExpireAt).unwrap(), "");
    }

    #[test]
    fn terminal_settings_round_trip() {
        let (store, svc) = service();
        assert_eq!(svc.terminal_info().unwrap(), TerminalInfo::default());

        let info = TerminalInfo {
            font_size: 18,
            cursor_style: CursorStyle::Underline,
            ..TerminalInfo::default()
        };
        svc.update_terminal(info.clone()).unwrap();

        assert_eq!(svc.terminal_info().unwrap(), info);
        assert_eq!(store.get_key(SettingKey::FontSize).unwrap(), "18");
    }

    #[tokio::test]
    async fn terminal_keys_not_writable_one_by_one() {
        let (store, svc) = service();
        let err = svc.update("FontSize", "99").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(store.get_key(SettingKey::FontSize).unwrap(), "12");
    }

    #[tokio::test]
    async fn huge_expiration_days_rejected() {
        let (store, svc) = service();
        svc.update("ExpirationDays", "15").await.unwrap();

        let err = svc.update("ExpirationDays", "4000000000").await.unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(store.get_key(SettingKey::ExpirationDays).unwrap(), "15");
    }
}
