//! Settings store subsystem.
//!
//! # Data Flow
//! ```text
//! facade / managers
//!     → SettingsStoreExt (typed accessors over SettingKey)
//!     → SettingsStore::get / set (single-key transactions)
//!     → MemoryStore (DashMap) | FileStore (JSON file, atomic replace)
//! ```
//!
//! # Design Decisions
//! - Every write is a single-key upsert; there is no multi-key batch
//! - Composite updates are sequences of writes, see `WriteSequence`
//! - Keys are plain strings at this layer so unknown keys can pass through

pub mod file;
pub mod keys;
pub mod memory;

use std::collections::HashMap;

use thiserror::Error;

use crate::error::ErrorKind;

pub use file::FileStore;
pub use keys::{SettingKey, DISABLE, ENABLE};
pub use memory::MemoryStore;

/// Errors produced by a settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("setting {0} not found")]
    NotFound(String),

    #[error("setting {key} holds an unusable value {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("settings store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("settings store lock poisoned")]
    Poisoned,

    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A transactional key → string mapping.
///
/// Implementations must make each `set` durable before returning and must
/// serialize writes so concurrent `set`s on one key cannot lose updates.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<String>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// All settings currently stored, sorted by key.
    fn entries(&self) -> StoreResult<Vec<(String, String)>>;

    /// Fetch several keys at once; missing keys are omitted from the result.
    fn get_many(&self, keys: &[&str]) -> StoreResult<HashMap<String, String>> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get(key) {
                Ok(value) => {
                    out.insert((*key).to_string(), value);
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

/// Typed accessors over [`SettingKey`].
pub trait SettingsStoreExt {
    fn get_key(&self, key: SettingKey) -> StoreResult<String>;
    fn get_or(&self, key: SettingKey, default: &str) -> StoreResult<String>;
    fn set_key(&self, key: SettingKey, value: &str) -> StoreResult<()>;
    fn get_flag(&self, key: SettingKey) -> StoreResult<bool>;
    fn get_u64(&self, key: SettingKey) -> StoreResult<u64>;
}

impl<S: SettingsStore + ?Sized> SettingsStoreExt for S {
    fn get_key(&self, key: SettingKey) -> StoreResult<String> {
        self.get(key.as_str())
    }

    fn get_or(&self, key: SettingKey, default: &str) -> StoreResult<String> {
        match self.get(key.as_str()) {
            Err(StoreError::NotFound(_)) => Ok(default.to_string()),
            other => other,
        }
    }

    fn set_key(&self, key: SettingKey, value: &str) -> StoreResult<()> {
        self.set(key.as_str(), value)
    }

    /// Missing flags read as off.
    fn get_flag(&self, key: SettingKey) -> StoreResult<bool> {
        let value = self.get_or(key, DISABLE)?;
        match value.as_str() {
            ENABLE | "true" => Ok(true),
            DISABLE | "false" | "" => Ok(false),
            _ => Err(StoreError::InvalidValue {
                key: key.as_str().to_string(),
                value,
            }),
        }
    }

    fn get_u64(&self, key: SettingKey) -> StoreResult<u64> {
        let value = self.get_key(key)?;
        value.trim().parse().map_err(|_| StoreError::InvalidValue {
            key: key.as_str().to_string(),
            value,
        })
    }
}

/// Encode a flag the way the panel persists it.
pub fn flag_value(on: bool) -> &'static str {
    if on {
        ENABLE
    } else {
        DISABLE
    }
}

/// Outcome of a failed [`WriteSequence`].
#[derive(Debug)]
pub struct SequenceFailure {
    /// Writes that were durably committed before the failure.
    pub committed: usize,
    pub total: usize,
    pub source: StoreError,
}

/// A finite sequence of single-key writes applied in order.
///
/// Each write either fully succeeds or fully fails. The first failure stops
/// the sequence; earlier writes are not undone and the caller learns how many
/// committed.
#[derive(Debug, Default)]
pub struct WriteSequence {
    writes: Vec<(String, String)>,
}

impl WriteSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: SettingKey, value: impl Into<String>) -> Self {
        self.writes.push((key.as_str().to_string(), value.into()));
        self
    }

    pub fn push_raw(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.writes.push((key.into(), value.into()));
        self
    }

    /// Keep only the first `n` writes.
    pub fn truncate(mut self, n: usize) -> Self {
        self.writes.truncate(n);
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn apply(self, store: &dyn SettingsStore) -> Result<(), SequenceFailure> {
        let total = self.writes.len();
        for (committed, (key, value)) in self.writes.iter().enumerate() {
            if let Err(source) = store.set(key, value) {
                tracing::warn!(
                    key = %key,
                    committed,
                    total,
                    error = %source,
                    "Settings write sequence interrupted"
                );
                return Err(SequenceFailure {
                    committed,
                    total,
                    source,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let store = MemoryStore::new();
        store.set_key(SettingKey::Ipv6, ENABLE).unwrap();
        store.set_key(SettingKey::ServerPort, "9999").unwrap();

        assert!(store.get_flag(SettingKey::Ipv6).unwrap());
        assert!(!store.get_flag(SettingKey::Ssl).unwrap());
        assert_eq!(store.get_u64(SettingKey::ServerPort).unwrap(), 9999);
        assert_eq!(store.get_or(SettingKey::Theme, "dark").unwrap(), "dark");
        assert!(matches!(
            store.get_key(SettingKey::Theme),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn bad_number_is_reported() {
        let store = MemoryStore::new();
        store.set_key(SettingKey::ServerPort, "http").unwrap();
        assert!(matches!(
            store.get_u64(SettingKey::ServerPort),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn get_many_skips_missing() {
        let store = MemoryStore::new();
        store.set("A", "1").unwrap();
        let found = store.get_many(&["A", "B"]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["A"], "1");
    }

    #[test]
    fn write_sequence_applies_in_order() {
        let store = MemoryStore::new();
        WriteSequence::new()
            .push(SettingKey::ProxyType, "http")
            .push(SettingKey::ProxyType, "socks5")
            .apply(&store)
            .unwrap();
        assert_eq!(store.get_key(SettingKey::ProxyType).unwrap(), "socks5");
    }
}
