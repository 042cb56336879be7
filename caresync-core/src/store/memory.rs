//! In-memory durable store, used by tests and ephemeral hosts.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{check_quota, DurableStore, StorageError};

/// Durable store backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes that would push total stored bytes past `quota`.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock()?;

        let total: u64 = entries.values().map(|v| v.len() as u64).sum();
        let replaced = entries.get(key).map(|v| v.len() as u64).unwrap_or(0);
        check_quota(self.quota, total, replaced, value.len() as u64)?;

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
