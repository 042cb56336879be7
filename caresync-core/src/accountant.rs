//! Reports how much of the storage allowance the subsystem is using.

use std::sync::Arc;

use serde::Serialize;

use crate::store::{DurableStore, Namespace, StorageError};

/// Typical browser-style allowance for a single origin.
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_WARN_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
    pub key_count: usize,
    /// Share of capacity used, clamped to `0..=100`.
    pub percent: f64,
    #[serde(skip)]
    warn_percent: f64,
}

impl StorageUsage {
    /// True once usage reaches the advisory threshold.
    pub fn is_near_capacity(&self) -> bool {
        self.percent >= self.warn_percent
    }
}

impl std::fmt::Display for StorageUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} bytes used ({:.1}%) across {} key{}",
            self.used_bytes,
            self.capacity_bytes,
            self.percent,
            self.key_count,
            if self.key_count == 1 { "" } else { "s" }
        )
    }
}

/// Sums the size of every value stored under a namespace.
pub struct StorageAccountant {
    store: Arc<dyn DurableStore>,
    namespace: Namespace,
    capacity_bytes: u64,
    warn_percent: f64,
}

impl StorageAccountant {
    pub fn new(store: Arc<dyn DurableStore>, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            warn_percent: DEFAULT_WARN_PERCENT,
        }
    }

    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    pub fn with_warn_percent(mut self, warn_percent: f64) -> Self {
        self.warn_percent = warn_percent.clamp(0.0, 100.0);
        self
    }

    pub fn usage(&self) -> Result<StorageUsage, StorageError> {
        let keys = self.store.keys(&self.namespace.prefix())?;

        let mut used_bytes = 0u64;
        for key in &keys {
            // A key removed between listing and reading counts as zero
            if let Some(value) = self.store.get(key)? {
                used_bytes += value.len() as u64;
            }
        }

        let usage = StorageUsage {
            used_bytes,
            capacity_bytes: self.capacity_bytes,
            key_count: keys.len(),
            percent: percent_of(used_bytes, self.capacity_bytes),
            warn_percent: self.warn_percent,
        };

        if usage.is_near_capacity() {
            tracing::warn!("Offline storage nearly full: {}", usage);
        }
        Ok(usage)
    }
}

fn percent_of(used: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return if used > 0 { 100.0 } else { 0.0 };
    }
    (used as f64 * 100.0 / capacity as f64).min(100.0)
}
