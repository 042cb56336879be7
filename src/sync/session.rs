//! Opens the offline subsystem from CLI configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use caresync_core::{
    ApiError, Connectivity, ConnectivityMonitor, DispatchTable, FileStore, HttpApi, Namespace,
    OfflineOptions, OfflineSync, ReachabilityProbe, RemoteApi, SyncError, MAX_LEASE_TTL_SECS,
};

use crate::config::Config;

/// Errors that can occur while opening a session.
#[derive(Debug)]
pub enum SessionError {
    /// The HTTP client could not be built
    ClientError(ApiError),
    /// The persisted queue could not be loaded
    StorageError(SyncError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::ClientError(e) => write!(f, "Failed to create API client: {}", e),
            SessionError::StorageError(e) => write!(f, "Failed to open offline store: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        SessionError::ClientError(e)
    }
}

impl From<SyncError> for SessionError {
    fn from(e: SyncError) -> Self {
        SessionError::StorageError(e)
    }
}

/// Stand-in backend used when no `api.base_url` is configured.
///
/// Never reachable, so everything stays queued locally.
struct NoBackend;

#[async_trait]
impl RemoteApi for NoBackend {
    async fn fetch(&self, path: &str) -> Result<Value, ApiError> {
        Err(not_configured(path))
    }

    async fn post(&self, path: &str, _body: &Value) -> Result<(), ApiError> {
        Err(not_configured(path))
    }
}

#[async_trait]
impl ReachabilityProbe for NoBackend {
    async fn check(&self) -> bool {
        false
    }
}

fn not_configured(path: &str) -> ApiError {
    ApiError::Transport(format!("no API configured for {}", path))
}

fn lease_ttl(secs: u64) -> Option<chrono::Duration> {
    match secs {
        0 => None,
        secs if secs > MAX_LEASE_TTL_SECS as u64 => {
            tracing::warn!(
                "sync.lease_ttl_secs = {} is too long, using {}",
                secs,
                MAX_LEASE_TTL_SECS
            );
            Some(chrono::Duration::seconds(MAX_LEASE_TTL_SECS))
        }
        secs => Some(chrono::Duration::seconds(secs as i64)),
    }
}

/// An opened offline subsystem plus the probe for its backend.
pub struct Session {
    pub offline: OfflineSync,
    probe: Arc<dyn ReachabilityProbe>,
}

impl Session {
    /// Opens the store under `data_dir`. Connectivity starts as offline until
    /// [`detect`](Self::detect) is called.
    pub fn open(config: &Config) -> Result<Self, SessionError> {
        let store = Arc::new(
            FileStore::new(config.data_dir.value.clone())
                .with_quota(config.storage.capacity_bytes),
        );

        let (api, probe): (Arc<dyn RemoteApi>, Arc<dyn ReachabilityProbe>) =
            match &config.api.base_url {
                Some(url) => {
                    let http = Arc::new(
                        HttpApi::new(
                            url.clone(),
                            config.api.api_key.clone(),
                            Duration::from_secs(config.api.timeout_secs),
                        )?
                        .with_health_path(config.api.health_path.clone()),
                    );
                    (
                        http.clone() as Arc<dyn RemoteApi>,
                        http as Arc<dyn ReachabilityProbe>,
                    )
                }
                None => {
                    let none = Arc::new(NoBackend);
                    (
                        none.clone() as Arc<dyn RemoteApi>,
                        none as Arc<dyn ReachabilityProbe>,
                    )
                }
            };

        let options = OfflineOptions {
            namespace: Namespace::new(config.namespace.value.clone()),
            dispatch: DispatchTable::default().with_overrides(config.sync.endpoints.clone()),
            sources: (&config.cache).into(),
            capacity_bytes: config.storage.capacity_bytes,
            warn_percent: config.storage.warn_percent,
            lease_ttl: lease_ttl(config.sync.lease_ttl_secs),
        };

        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
        let offline = OfflineSync::open(store, api, monitor, options)?;

        Ok(Self { offline, probe })
    }

    /// Probes the backend and records the result on the monitor.
    pub async fn detect(&self) -> Connectivity {
        let state = Connectivity::from(self.probe.check().await);
        self.offline.monitor().set(state);
        state
    }

    pub fn probe(&self) -> Arc<dyn ReachabilityProbe> {
        self.probe.clone()
    }
}
