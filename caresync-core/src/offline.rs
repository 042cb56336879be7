//! Host-facing entry point that wires the offline subsystem together.

use std::sync::Arc;

use chrono::Duration;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::accountant::{
    StorageAccountant, StorageUsage, DEFAULT_CAPACITY_BYTES, DEFAULT_WARN_PERCENT,
};
use crate::agent::spawn_auto_sync;
use crate::api::{DispatchTable, RefreshSources, RemoteApi};
use crate::cache::{LocalCache, RefreshReport};
use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::{DrainReport, SyncCoordinator};
use crate::error::SyncError;
use crate::lease::DrainLease;
use crate::models::{CachedSnapshot, MutationType, PendingMutation};
use crate::queue::PendingQueue;
use crate::store::{DurableStore, Namespace};

/// Tunables for [`OfflineSync::open`].
#[derive(Debug, Clone)]
pub struct OfflineOptions {
    pub namespace: Namespace,
    pub dispatch: DispatchTable,
    pub sources: RefreshSources,
    pub capacity_bytes: u64,
    pub warn_percent: f64,
    /// Guard drains with a storage lease of this length. `None` disables it.
    pub lease_ttl: Option<Duration>,
}

impl Default for OfflineOptions {
    fn default() -> Self {
        Self {
            namespace: Namespace::default(),
            dispatch: DispatchTable::default(),
            sources: RefreshSources::default(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            warn_percent: DEFAULT_WARN_PERCENT,
            lease_ttl: None,
        }
    }
}

/// The offline-first subsystem: cache, queue, coordinator and accounting
/// over one durable store.
pub struct OfflineSync {
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<Mutex<PendingQueue>>,
    cache: LocalCache,
    api: Arc<dyn RemoteApi>,
    coordinator: Arc<SyncCoordinator>,
    accountant: StorageAccountant,
}

impl OfflineSync {
    /// Opens the subsystem, loading the persisted queue.
    ///
    /// The cache snapshot is not read until [`load_cache`](Self::load_cache).
    pub fn open(
        store: Arc<dyn DurableStore>,
        api: Arc<dyn RemoteApi>,
        monitor: Arc<ConnectivityMonitor>,
        options: OfflineOptions,
    ) -> Result<Self, SyncError> {
        let queue = Arc::new(Mutex::new(PendingQueue::open(
            store.clone(),
            &options.namespace,
        )?));
        let cache = LocalCache::new(store.clone(), &options.namespace, options.sources);

        let mut coordinator =
            SyncCoordinator::new(monitor.clone(), queue.clone(), api.clone(), options.dispatch);
        if let Some(ttl) = options.lease_ttl {
            coordinator = coordinator.with_lease(DrainLease::new(
                store.clone(),
                &options.namespace,
                ttl,
            ));
        }

        let accountant = StorageAccountant::new(store, options.namespace)
            .with_capacity(options.capacity_bytes)
            .with_warn_percent(options.warn_percent);

        Ok(Self {
            monitor,
            queue,
            cache,
            api,
            coordinator: Arc::new(coordinator),
            accountant,
        })
    }

    /// Queues a user action for the next drain.
    pub async fn enqueue(
        &self,
        mutation_type: MutationType,
        title: impl Into<String>,
        payload: Value,
    ) -> Result<PendingMutation, SyncError> {
        let mutation = self
            .queue
            .lock()
            .await
            .enqueue(mutation_type, title, payload)?;
        Ok(mutation)
    }

    /// Items still waiting to be sent, oldest first.
    pub async fn pending(&self) -> Vec<PendingMutation> {
        self.queue.lock().await.list().to_vec()
    }

    /// Stored records that could not be read as actions. They are kept
    /// until the queue is cleared.
    pub async fn unreadable(&self) -> usize {
        self.queue.lock().await.unreadable().len()
    }

    pub async fn refresh_cache(&mut self) -> Result<RefreshReport, SyncError> {
        let report = self.cache.refresh(self.api.as_ref()).await?;
        Ok(report)
    }

    pub fn load_cache(&mut self) -> Result<Option<&CachedSnapshot>, SyncError> {
        Ok(self.cache.load()?)
    }

    pub fn snapshot(&self) -> Option<&CachedSnapshot> {
        self.cache.snapshot()
    }

    pub async fn drain(&self) -> Result<DrainReport, SyncError> {
        self.coordinator.drain().await
    }

    pub fn clear_cache(&mut self) -> Result<bool, SyncError> {
        Ok(self.cache.clear()?)
    }

    pub async fn clear_queue(&self) -> Result<(), SyncError> {
        self.queue.lock().await.clear()?;
        Ok(())
    }

    /// Removes the cached snapshot and every pending action.
    pub async fn clear_all(&mut self) -> Result<(), SyncError> {
        self.clear_cache()?;
        self.clear_queue().await?;
        tracing::info!("Cleared offline cache and pending queue");
        Ok(())
    }

    pub fn usage(&self) -> Result<StorageUsage, SyncError> {
        Ok(self.accountant.usage()?)
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Starts draining on every reconnect. See [`spawn_auto_sync`].
    pub fn spawn_auto_sync(&self) -> JoinHandle<()> {
        spawn_auto_sync(self.coordinator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpApi;
    use crate::connectivity::Connectivity;
    use crate::coordinator::DrainOutcome;
    use crate::store::{FileStore, MemoryStore};
    use crate::testing::FakeApi;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    type Received = Arc<StdMutex<Vec<Value>>>;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn record(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
        received.lock().unwrap().push(body);
        StatusCode::CREATED
    }

    #[tokio::test]
    async fn test_offline_review_syncs_over_http() {
        let received: Received = Arc::default();
        let router = Router::new()
            .route("/api/reviews", post(record))
            .route("/api/doctors", get(|| async { Json(json!([{"id": 7}])) }))
            .with_state(received.clone());
        let base_url = spawn_backend(router).await;

        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(temp_dir.path().to_path_buf()));
        let api = HttpApi::new(base_url, None, std::time::Duration::from_secs(5)).unwrap();
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
        let mut sync = OfflineSync::open(
            store.clone(),
            Arc::new(api),
            monitor.clone(),
            OfflineOptions::default(),
        )
        .unwrap();

        sync.enqueue(MutationType::Review, "X", json!({"rating": 5}))
            .await
            .unwrap();
        let pending = sync.pending().await;
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].synced);
        let stored: Vec<PendingMutation> =
            serde_json::from_str(&store.get("caresync:pending-queue").unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 1);

        let offline = sync.drain().await.unwrap();
        assert!(matches!(offline.outcome, DrainOutcome::Skipped(_)));

        monitor.set(Connectivity::Online);
        let report = sync.drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Complete { synced: 1 });
        assert!(sync.pending().await.is_empty());
        assert_eq!(*received.lock().unwrap(), vec![json!({"rating": 5})]);

        let refreshed = sync.refresh_cache().await.unwrap();
        assert_eq!(refreshed.snapshot.doctors, vec![json!({"id": 7})]);
        assert_eq!(refreshed.failed.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = Arc::new(MemoryStore::new());
        let api = FakeApi::new().with_read("/api/pharmacies", Ok(json!([{"id": 1}])));
        let mut sync = OfflineSync::open(
            store.clone(),
            Arc::new(api),
            Arc::new(ConnectivityMonitor::new(Connectivity::Offline)),
            OfflineOptions::default(),
        )
        .unwrap();

        sync.refresh_cache().await.unwrap();
        sync.enqueue(MutationType::Appointment, "Dentist", json!({}))
            .await
            .unwrap();
        assert_eq!(sync.usage().unwrap().key_count, 2);

        sync.clear_all().await.unwrap();

        assert!(sync.snapshot().is_none());
        assert!(sync.pending().await.is_empty());
        assert!(sync.load_cache().unwrap().is_none());
        assert_eq!(store.get("caresync:pending-queue").unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_unknown_queued_type_does_not_block_open() {
        let store = Arc::new(MemoryStore::new());
        let review = PendingMutation::new(MutationType::Review, "Great", json!({"rating": 4}));
        let stored = json!([
            review,
            {"id": "rx-1", "type": "prescription", "title": "Refill", "payload": {}}
        ]);
        store
            .set("caresync:pending-queue", &stored.to_string())
            .unwrap();

        let api = Arc::new(FakeApi::new());
        let mut sync = OfflineSync::open(
            store.clone(),
            api.clone(),
            Arc::new(ConnectivityMonitor::new(Connectivity::Online)),
            OfflineOptions::default(),
        )
        .unwrap();
        assert_eq!(sync.pending().await, vec![review]);
        assert_eq!(sync.unreadable().await, 1);

        let report = sync.drain().await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Complete { synced: 1 });
        assert_eq!(api.posts().len(), 1);
        let left: Vec<Value> =
            serde_json::from_str(&store.get("caresync:pending-queue").unwrap().unwrap()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["type"], json!("prescription"));

        sync.clear_all().await.unwrap();
        assert_eq!(store.get("caresync:pending-queue").unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_reopen_keeps_queue_and_cache() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(temp_dir.path().to_path_buf()));
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
        let api = Arc::new(FakeApi::new().with_read("/api/users/me", Ok(json!({"name": "Ana"}))));

        {
            let mut sync =
                OfflineSync::open(store.clone(), api.clone(), monitor.clone(), OfflineOptions::default())
                    .unwrap();
            sync.refresh_cache().await.unwrap();
            sync.enqueue(MutationType::Message, "hi", json!({"body": "hi"}))
                .await
                .unwrap();
        }

        let mut reopened =
            OfflineSync::open(store, api, monitor, OfflineOptions::default()).unwrap();
        assert_eq!(reopened.pending().await.len(), 1);
        let snapshot = reopened.load_cache().unwrap().unwrap();
        assert_eq!(snapshot.user_profile, Some(json!({"name": "Ana"})));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
        let api = Arc::new(FakeApi::new());

        let first = OfflineSync::open(
            store.clone(),
            api.clone(),
            monitor.clone(),
            OfflineOptions::default(),
        )
        .unwrap();
        let second = OfflineSync::open(
            store.clone(),
            api,
            monitor,
            OfflineOptions {
                namespace: Namespace::new("other"),
                ..OfflineOptions::default()
            },
        )
        .unwrap();

        first
            .enqueue(MutationType::Review, "r", json!({}))
            .await
            .unwrap();

        assert!(second.pending().await.is_empty());
        assert_eq!(second.usage().unwrap().key_count, 0);
    }
}
