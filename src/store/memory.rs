//! In-process settings store.

use dashmap::DashMap;

use super::{SettingsStore, StoreError, StoreResult};

/// A volatile store backed by a concurrent map.
///
/// Each key lives in a DashMap shard, so writers to the same key are
/// serialized by the shard lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from existing pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (k, v) in pairs {
            store.inner.insert(k.into(), v.into());
        }
        store
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<String> {
        self.inner
            .get(key)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let mut all: Vec<_> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort();
        Ok(all)
    }
}
