//! Local snapshot of reference data.
//!
//! A refresh always rebuilds the whole [`CachedSnapshot`] from four
//! independent reads. A failed read degrades that collection to empty
//! instead of failing the refresh.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::api::{ApiError, RefreshSources, RemoteApi};
use crate::models::{CachedSnapshot, Reference, ReferenceKind};
use crate::store::{DurableStore, Namespace, StorageError, CACHE_KEY};

/// Outcome of a [`LocalCache::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub snapshot: CachedSnapshot,
    /// Collections whose fetch failed and were stored empty.
    pub failed: Vec<ReferenceKind>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Persisted cache of pharmacies, doctors, profile and emergency contacts.
pub struct LocalCache {
    store: Arc<dyn DurableStore>,
    key: String,
    sources: RefreshSources,
    snapshot: Option<CachedSnapshot>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn DurableStore>, namespace: &Namespace, sources: RefreshSources) -> Self {
        Self {
            store,
            key: namespace.key(CACHE_KEY),
            sources,
            snapshot: None,
        }
    }

    /// Loads the persisted snapshot into memory.
    ///
    /// Returns `Ok(None)` if nothing has been cached yet.
    pub fn load(&mut self) -> Result<Option<&CachedSnapshot>, StorageError> {
        self.snapshot = match self.store.get(&self.key)? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                key: self.key.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        Ok(self.snapshot.as_ref())
    }

    /// The in-memory snapshot, if loaded or refreshed.
    pub fn snapshot(&self) -> Option<&CachedSnapshot> {
        self.snapshot.as_ref()
    }

    /// Fetches all four collections concurrently and replaces the snapshot.
    pub async fn refresh(&mut self, api: &dyn RemoteApi) -> Result<RefreshReport, StorageError> {
        let (pharmacies, doctors, profile, contacts) = futures::join!(
            api.fetch(self.sources.path(ReferenceKind::Pharmacies)),
            api.fetch(self.sources.path(ReferenceKind::Doctors)),
            api.fetch(self.sources.path(ReferenceKind::UserProfile)),
            api.fetch(self.sources.path(ReferenceKind::EmergencyContacts)),
        );

        let mut failed = Vec::new();
        let pharmacies = list_or_empty(ReferenceKind::Pharmacies, pharmacies, &mut failed);
        let doctors = list_or_empty(ReferenceKind::Doctors, doctors, &mut failed);
        let user_profile = profile_or_none(profile, &mut failed);
        let emergency_contacts =
            list_or_empty(ReferenceKind::EmergencyContacts, contacts, &mut failed);

        let snapshot = CachedSnapshot {
            pharmacies,
            doctors,
            user_profile,
            emergency_contacts,
            last_update: Utc::now(),
        };

        let raw = serde_json::to_string(&snapshot)?;
        self.store.set(&self.key, &raw)?;
        self.snapshot = Some(snapshot.clone());

        tracing::info!(
            records = snapshot.record_count(),
            failed = failed.len(),
            "Cache refreshed"
        );
        Ok(RefreshReport { snapshot, failed })
    }

    /// Deletes the persisted snapshot. Returns `true` if one existed.
    pub fn clear(&mut self) -> Result<bool, StorageError> {
        let existed = self.store.remove(&self.key)?;
        self.snapshot = None;
        Ok(existed)
    }
}

fn list_or_empty(
    kind: ReferenceKind,
    result: Result<Value, ApiError>,
    failed: &mut Vec<ReferenceKind>,
) -> Vec<Reference> {
    match result {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            tracing::warn!("Expected a list of {}, got {}", kind, json_kind(&other));
            failed.push(kind);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", kind, e);
            failed.push(kind);
            Vec::new()
        }
    }
}

fn profile_or_none(
    result: Result<Value, ApiError>,
    failed: &mut Vec<ReferenceKind>,
) -> Option<Reference> {
    match result {
        Ok(Value::Null) => None,
        Ok(profile @ Value::Object(_)) => Some(profile),
        Ok(other) => {
            tracing::warn!("Expected a user profile object, got {}", json_kind(&other));
            failed.push(ReferenceKind::UserProfile);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to fetch user profile: {}", e);
            failed.push(ReferenceKind::UserProfile);
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
