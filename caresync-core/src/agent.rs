//! Background task that drains the queue whenever the network comes back.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::connectivity::Connectivity;
use crate::coordinator::SyncCoordinator;

/// Spawns a task that runs one drain per `Online` transition.
///
/// Errors are logged, never propagated; the task keeps listening until the
/// monitor is dropped or the handle is aborted.
pub fn spawn_auto_sync(coordinator: Arc<SyncCoordinator>) -> JoinHandle<()> {
    let mut events = coordinator.monitor().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Connectivity::Online) => drain_once(&coordinator).await,
                Ok(Connectivity::Offline) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Auto-sync missed {} connectivity events", skipped);
                    if coordinator.monitor().is_online() {
                        drain_once(&coordinator).await;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn drain_once(coordinator: &SyncCoordinator) {
    match coordinator.drain().await {
        Ok(report) => tracing::info!("Auto-sync: {}", report.notification()),
        Err(e) => tracing::warn!("Auto-sync: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DispatchTable;
    use crate::connectivity::ConnectivityMonitor;
    use crate::models::MutationType;
    use crate::queue::PendingQueue;
    use crate::store::{MemoryStore, Namespace};
    use crate::testing::FakeApi;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    async fn wait_for_posts(api: &FakeApi, count: usize) {
        for _ in 0..100 {
            if api.posts().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_offline_enqueue_then_reconnect() {
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(Mutex::new(
            PendingQueue::open(store, &Namespace::default()).unwrap(),
        ));
        let api = Arc::new(FakeApi::new());
        let coordinator = Arc::new(SyncCoordinator::new(
            monitor.clone(),
            queue.clone(),
            api.clone(),
            DispatchTable::default(),
        ));
        let handle = spawn_auto_sync(coordinator);

        queue
            .lock()
            .await
            .enqueue(MutationType::Review, "X", json!({"stars": 4}))
            .unwrap();
        assert!(api.posts().is_empty());

        monitor.set(Connectivity::Online);
        wait_for_posts(&api, 1).await;

        let posts = api.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "/api/reviews");
        assert_eq!(posts[0].1, json!({"stars": 4}));

        // The drain finishes after the POST returns
        for _ in 0..100 {
            if queue.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(queue.lock().await.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_offline_transition_does_not_drain() {
        let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Online));
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(Mutex::new(
            PendingQueue::open(store, &Namespace::default()).unwrap(),
        ));
        queue
            .lock()
            .await
            .enqueue(MutationType::Message, "hello", json!({}))
            .unwrap();
        let api = Arc::new(FakeApi::new());
        let coordinator = Arc::new(SyncCoordinator::new(
            monitor.clone(),
            queue.clone(),
            api.clone(),
            DispatchTable::default(),
        ));
        let handle = spawn_auto_sync(coordinator);

        monitor.set(Connectivity::Offline);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(api.posts().is_empty());
        assert_eq!(queue.lock().await.len(), 1);
        handle.abort();
    }
}
