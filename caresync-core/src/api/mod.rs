//! Remote REST API access.
//!
//! The subsystem only needs two verbs from the backend: GET a reference
//! collection when refreshing the cache, and POST a queued payload when
//! draining. Both go through [`RemoteApi`] so tests can substitute a fake.

mod dispatch;
mod error;
mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::ReferenceKind;

pub use dispatch::{DispatchError, DispatchTable};
pub use error::ApiError;
pub use http::HttpApi;

/// Read and write access to the remote API.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// GETs `path` and returns the decoded JSON body.
    async fn fetch(&self, path: &str) -> Result<Value, ApiError>;

    /// POSTs `body` as JSON to `path`. Any 2xx response is a success.
    async fn post(&self, path: &str, body: &Value) -> Result<(), ApiError>;
}

/// Answers whether the remote API is currently reachable.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Read endpoints used to refresh each reference collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSources {
    pub pharmacies: String,
    pub doctors: String,
    pub user_profile: String,
    pub emergency_contacts: String,
}

impl RefreshSources {
    pub fn path(&self, kind: ReferenceKind) -> &str {
        match kind {
            ReferenceKind::Pharmacies => &self.pharmacies,
            ReferenceKind::Doctors => &self.doctors,
            ReferenceKind::UserProfile => &self.user_profile,
            ReferenceKind::EmergencyContacts => &self.emergency_contacts,
        }
    }
}

impl Default for RefreshSources {
    fn default() -> Self {
        Self {
            pharmacies: "/api/pharmacies".to_string(),
            doctors: "/api/doctors".to_string(),
            user_profile: "/api/users/me".to_string(),
            emergency_contacts: "/api/emergency-contacts".to_string(),
        }
    }
}
