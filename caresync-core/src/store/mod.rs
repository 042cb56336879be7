//! Durable key-value storage for the offline subsystem.
//!
//! Every persisted structure (cache snapshot, pending queue, drain lease) is a
//! single string value under a namespaced key. Values are always replaced
//! wholesale, never patched.
//!
//! Storage layout (file backend):
//! ```text
//! ~/.local/share/caresync/
//! ├── caresync%3Aoffline-cache.json
//! ├── caresync%3Apending-queue.json
//! └── caresync%3Async-lease.json
//! ```

mod file;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key holding the cached reference-data snapshot.
pub const CACHE_KEY: &str = "offline-cache";
/// Key holding the pending mutation queue.
pub const QUEUE_KEY: &str = "pending-queue";
/// Key holding the cross-instance drain lease.
pub const LEASE_KEY: &str = "sync-lease";

/// A persistent, string-keyed store.
///
/// Implementations must make `set` a whole-value replacement: after a failed
/// `set` the previous value (if any) is still readable.
pub trait DurableStore: Send + Sync {
    /// Reads a value. Returns `Ok(None)` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a key. Returns `Ok(true)` if it existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Lists every key starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Application namespace that scopes every key the subsystem writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    name: String,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix shared by all keys in this namespace (`<name>:`).
    pub fn prefix(&self) -> String {
        format!("{}:", self.name)
    }

    /// Fully qualified key for `local`.
    pub fn key(&self, local: &str) -> String {
        format!("{}:{}", self.name, local)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new("caresync")
    }
}

/// Errors that can occur while reading or writing the durable store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Stored value for '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Storage quota exceeded: {required} bytes needed, {quota} bytes allowed")]
    QuotaExceeded { required: u64, quota: u64 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Rejects a write when the resulting total would exceed `quota`.
///
/// `current_total` is the sum of all stored value lengths and `replaced` is the
/// length of the value being overwritten (0 for a new key).
pub(crate) fn check_quota(
    quota: Option<u64>,
    current_total: u64,
    replaced: u64,
    incoming: u64,
) -> Result<(), StorageError> {
    if let Some(quota) = quota {
        let required = current_total.saturating_sub(replaced) + incoming;
        if required > quota {
            return Err(StorageError::QuotaExceeded { required, quota });
        }
    }
    Ok(())
}
