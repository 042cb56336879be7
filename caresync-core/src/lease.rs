//! Storage-backed lease that keeps two instances from draining at once.
//!
//! The durable store has no compare-and-swap, so acquisition is write then
//! read-back. Two instances racing within the same instant can both believe
//! they won; the lease only narrows that window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{DurableStore, Namespace, StorageError, LEASE_KEY};

/// Longest lease a drain may hold, in seconds. Longer TTLs are capped.
pub const MAX_LEASE_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaseRecord {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// Result of [`DrainLease::try_acquire`].
#[derive(Debug, Clone, PartialEq)]
pub enum LeaseStatus {
    Acquired,
    HeldBy {
        owner: String,
        expires_at: DateTime<Utc>,
    },
}

/// A named, expiring claim on the right to drain the shared queue.
pub struct DrainLease {
    store: Arc<dyn DurableStore>,
    key: String,
    owner: String,
    ttl: Duration,
}

impl DrainLease {
    /// Creates a lease handle with a fresh random owner id.
    pub fn new(store: Arc<dyn DurableStore>, namespace: &Namespace, ttl: Duration) -> Self {
        Self {
            store,
            key: namespace.key(LEASE_KEY),
            owner: Uuid::new_v4().to_string(),
            ttl: ttl.min(Duration::seconds(MAX_LEASE_TTL_SECS)),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Claims the lease unless another owner holds an unexpired one.
    pub fn try_acquire(&self) -> Result<LeaseStatus, StorageError> {
        let now = Utc::now();

        if let Some(current) = self.read()? {
            if current.owner != self.owner && current.expires_at > now {
                return Ok(LeaseStatus::HeldBy {
                    owner: current.owner,
                    expires_at: current.expires_at,
                });
            }
        }

        let record = LeaseRecord {
            owner: self.owner.clone(),
            expires_at: now + self.ttl,
        };
        self.store.set(&self.key, &serde_json::to_string(&record)?)?;

        // Another instance may have written between our read and write
        match self.read()? {
            Some(current) if current.owner == self.owner => Ok(LeaseStatus::Acquired),
            Some(current) => Ok(LeaseStatus::HeldBy {
                owner: current.owner,
                expires_at: current.expires_at,
            }),
            None => Ok(LeaseStatus::HeldBy {
                owner: String::new(),
                expires_at: now,
            }),
        }
    }

    /// Releases the lease if this instance holds it.
    pub fn release(&self) -> Result<bool, StorageError> {
        match self.read()? {
            Some(current) if current.owner == self.owner => self.store.remove(&self.key),
            _ => Ok(false),
        }
    }

    fn read(&self) -> Result<Option<LeaseRecord>, StorageError> {
        match self.store.get(&self.key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    // An unreadable lease can't be honored; treat it as free
                    tracing::warn!("Ignoring unreadable drain lease: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for DrainLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainLease")
            .field("key", &self.key)
            .field("owner", &self.owner)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn pair(ttl: Duration) -> (DrainLease, DrainLease, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ns = Namespace::default();
        (
            DrainLease::new(store.clone(), &ns, ttl),
            DrainLease::new(store.clone(), &ns, ttl),
            store,
        )
    }

    #[test]
    fn test_acquire_free_lease() {
        let (a, _b, store) = pair(Duration::minutes(2));
        assert_eq!(a.try_acquire().unwrap(), LeaseStatus::Acquired);
        assert!(store.get("caresync:sync-lease").unwrap().is_some());
    }

    #[test]
    fn test_second_owner_is_blocked() {
        let (a, b, _store) = pair(Duration::minutes(2));
        a.try_acquire().unwrap();

        match b.try_acquire().unwrap() {
            LeaseStatus::HeldBy { owner, .. } => assert_eq!(owner, a.owner()),
            other => panic!("expected HeldBy, got {:?}", other),
        }
    }

    #[test]
    fn test_reacquire_by_same_owner() {
        let (a, _b, _store) = pair(Duration::minutes(2));
        assert_eq!(a.try_acquire().unwrap(), LeaseStatus::Acquired);
        assert_eq!(a.try_acquire().unwrap(), LeaseStatus::Acquired);
    }

    #[test]
    fn test_expired_lease_can_be_taken() {
        let (a, b, _store) = pair(Duration::seconds(-1));
        a.try_acquire().unwrap();
        assert_eq!(b.try_acquire().unwrap(), LeaseStatus::Acquired);
    }

    #[test]
    fn test_release_only_by_owner() {
        let (a, b, store) = pair(Duration::minutes(2));
        a.try_acquire().unwrap();

        assert!(!b.release().unwrap());
        assert!(store.get("caresync:sync-lease").unwrap().is_some());

        assert!(a.release().unwrap());
        assert!(store.get("caresync:sync-lease").unwrap().is_none());
        assert_eq!(b.try_acquire().unwrap(), LeaseStatus::Acquired);
    }

    #[test]
    fn test_long_ttl_is_capped() {
        let (a, b, _store) = pair(Duration::days(365 * 1000));
        assert_eq!(a.try_acquire().unwrap(), LeaseStatus::Acquired);
        match b.try_acquire().unwrap() {
            LeaseStatus::HeldBy { expires_at, .. } => {
                assert!(expires_at <= Utc::now() + Duration::seconds(MAX_LEASE_TTL_SECS));
            }
            other => panic!("expected HeldBy, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_lease_is_free() {
        let (a, _b, store) = pair(Duration::minutes(2));
        store.set("caresync:sync-lease", "garbage").unwrap();
        assert_eq!(a.try_acquire().unwrap(), LeaseStatus::Acquired);
    }
}
