use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An opaque reference-data record. Its structure is owned by the remote API.
pub type Reference = Value;

/// One of the four reference collections held in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    Pharmacies,
    Doctors,
    UserProfile,
    EmergencyContacts,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Pharmacies => write!(f, "pharmacies"),
            ReferenceKind::Doctors => write!(f, "doctors"),
            ReferenceKind::UserProfile => write!(f, "user profile"),
            ReferenceKind::EmergencyContacts => write!(f, "emergency contacts"),
        }
    }
}

/// Wholesale copy of reference data, replaced in full on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSnapshot {
    pub pharmacies: Vec<Reference>,
    pub doctors: Vec<Reference>,
    pub user_profile: Option<Reference>,
    pub emergency_contacts: Vec<Reference>,
    pub last_update: DateTime<Utc>,
}

impl CachedSnapshot {
    /// Time elapsed since the snapshot was refreshed.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_update
    }

    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }

    /// Number of records across all collections (the profile counts as one).
    pub fn record_count(&self) -> usize {
        self.pharmacies.len()
            + self.doctors.len()
            + self.emergency_contacts.len()
            + usize::from(self.user_profile.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(last_update: DateTime<Utc>) -> CachedSnapshot {
        CachedSnapshot {
            pharmacies: vec![json!({"id": 1}), json!({"id": 2})],
            doctors: vec![json!({"id": 10})],
            user_profile: Some(json!({"name": "Ana"})),
            emergency_contacts: vec![],
            last_update,
        }
    }

    #[test]
    fn test_persisted_layout() {
        let snapshot = sample(Utc::now());
        let value = serde_json::to_value(&snapshot).unwrap();

        assert!(value["pharmacies"].is_array());
        assert!(value["doctors"].is_array());
        assert_eq!(value["userProfile"]["name"], "Ana");
        assert!(value["emergencyContacts"].is_array());
        assert!(value["lastUpdate"].is_string());
    }

    #[test]
    fn test_null_profile_loads_as_none() {
        let raw = r#"{
            "pharmacies": [],
            "doctors": [],
            "userProfile": null,
            "emergencyContacts": [],
            "lastUpdate": "2025-03-01T09:30:00Z"
        }"#;
        let snapshot: CachedSnapshot = serde_json::from_str(raw).unwrap();
        assert!(snapshot.user_profile.is_none());
        assert_eq!(snapshot.record_count(), 0);
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let snapshot = sample(now - Duration::hours(2));

        assert!(snapshot.is_stale(Duration::hours(1), now));
        assert!(!snapshot.is_stale(Duration::hours(3), now));
        assert_eq!(snapshot.record_count(), 4);
    }
}
