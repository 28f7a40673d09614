//! Read-only view over the credential settings.

use chrono::{DateTime, Utc};

use crate::mfa::totp;
use crate::store::{SettingKey, SettingsStore, SettingsStoreExt, StoreResult, ENABLE};

/// `{passwordHash, passwordExpireAt, mfaStatus, mfaSecret, mfaInterval}` as
/// currently stored.
///
/// Only the password and MFA managers write these keys.
#[derive(Clone, Default)]
pub struct CredentialState {
    pub password_hash: String,
    pub password_expire_at: Option<DateTime<Utc>>,
    pub mfa_status: String,
    pub mfa_secret: String,
    pub mfa_interval: Option<u64>,
}

impl CredentialState {
    pub fn load(store: &dyn SettingsStore) -> StoreResult<Self> {
        let expire_raw = store.get_or(SettingKey::PasswordExpireAt, "")?;
        let interval_raw = store.get_or(SettingKey::MfaInterval, "")?;

        Ok(Self {
            password_hash: store.get_or(SettingKey::Password, "")?,
            password_expire_at: parse_expiry(&expire_raw),
            mfa_status: store.get_or(SettingKey::MfaStatus, "")?,
            mfa_secret: store.get_or(SettingKey::MfaSecret, "")?,
            mfa_interval: interval_raw.trim().parse().ok().filter(|i| *i > 0),
        })
    }

    /// MFA counts as enabled only once the status flag was committed on top
    /// of a usable secret and interval.
    pub fn mfa_enabled(&self) -> bool {
        self.mfa_status == ENABLE
            && self.mfa_interval.is_some()
            && !self.mfa_secret.is_empty()
            && totp::check_secret(&self.mfa_secret).is_ok()
    }

    /// Whether the password must be replaced before a normal session is allowed.
    pub fn password_expired(&self, now: DateTime<Utc>) -> bool {
        self.password_expire_at.is_some_and(|at| now >= at)
    }
}

impl std::fmt::Debug for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialState")
            .field("password_hash", &"<redacted>")
            .field("password_expire_at", &self.password_expire_at)
            .field("mfa_status", &self.mfa_status)
            .field("mfa_secret", &"<redacted>")
            .field("mfa_interval", &self.mfa_interval)
            .finish()
    }
}

/// Empty or unparsable values mean "never expires".
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, DISABLE};
    use chrono::Duration;

    #[test]
    fn half_written_mfa_is_disabled() {
        let issued = totp::issue("admin", "Panel", 30).unwrap();
        let store = MemoryStore::new();
        store.set_key(SettingKey::MfaSecret, &issued.secret).unwrap();
        store.set_key(SettingKey::MfaInterval, "30").unwrap();
        store.set_key(SettingKey::MfaStatus, DISABLE).unwrap();
        assert!(!CredentialState::load(&store).unwrap().mfa_enabled());

        store.set_key(SettingKey::MfaStatus, ENABLE).unwrap();
        assert!(CredentialState::load(&store).unwrap().mfa_enabled());
    }

    #[test]
    fn enabled_flag_without_secret_is_not_enough() {
        let store = MemoryStore::new();
        store.set_key(SettingKey::MfaStatus, ENABLE).unwrap();
        store.set_key(SettingKey::MfaInterval, "30").unwrap();
        assert!(!CredentialState::load(&store).unwrap().mfa_enabled());
    }

    #[test]
    fn expiry_comparison() {
        let now = Utc::now();
        let store = MemoryStore::new();
        store
            .set_key(
                SettingKey::PasswordExpireAt,
                &(now - Duration::days(1)).to_rfc3339(),
            )
            .unwrap();
        assert!(CredentialState::load(&store).unwrap().password_expired(now));

        store.set_key(SettingKey::PasswordExpireAt, "").unwrap();
        assert!(!CredentialState::load(&store).unwrap().password_expired(now));
    }

    #[test]
    fn debug_hides_secrets() {
        let state = CredentialState {
            password_hash: "$argon2id$v=19$secret".into(),
            mfa_secret: "JBSWY3DPEHPK3PXP".into(),
            ..Default::default()
        };
        let printed = format!("{state:?}");
        assert!(!printed.contains("argon2id"));
        assert!(!printed.contains("JBSWY3DPEHPK3PXP"));
    }
}
