//! Replays the pending queue against the remote API.
//!
//! A drain sends every unsynced item, one request at a time, in enqueue
//! order. Failures are recorded and left in the queue for the next drain;
//! nothing is retried within a pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::api::{ApiError, DispatchError, DispatchTable, RemoteApi};
use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncError;
use crate::lease::{DrainLease, LeaseStatus};
use crate::models::{MutationType, PendingMutation};
use crate::queue::PendingQueue;

/// Whether a drain is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainState {
    Idle,
    Draining,
}

/// Why a drain did nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Offline,
    EmptyQueue,
    LeaseHeld {
        owner: String,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    Skipped(SkipReason),
    /// Every item attempted in the pass was accepted.
    Complete { synced: usize },
    /// Only `synced` of the `total` items in the pass were accepted.
    Partial { synced: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request failed or the server rejected it.
    Network { retryable: bool },
    /// No endpoint is configured for the item's type.
    Configuration,
}

/// One item that stayed queued after a drain.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub id: String,
    pub title: String,
    pub mutation_type: MutationType,
    pub kind: FailureKind,
    pub message: String,
}

impl DispatchFailure {
    fn network(mutation: &PendingMutation, error: &ApiError) -> Self {
        Self {
            id: mutation.id.clone(),
            title: mutation.title.clone(),
            mutation_type: mutation.mutation_type,
            kind: FailureKind::Network {
                retryable: error.is_retryable(),
            },
            message: error.to_string(),
        }
    }

    fn configuration(mutation: &PendingMutation, error: &DispatchError) -> Self {
        Self {
            id: mutation.id.clone(),
            title: mutation.title.clone(),
            mutation_type: mutation.mutation_type,
            kind: FailureKind::Configuration,
            message: error.to_string(),
        }
    }
}

/// Summary of one drain pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    pub failures: Vec<DispatchFailure>,
    /// The pass stopped early and the remaining items were not sent.
    pub interrupted: bool,
    /// Another instance took the drain lease mid-pass.
    pub lease_lost: bool,
    /// Items left in the queue after the pass.
    pub remaining: usize,
}

impl DrainReport {
    fn skipped(reason: SkipReason, remaining: usize) -> Self {
        Self {
            outcome: DrainOutcome::Skipped(reason),
            failures: Vec::new(),
            interrupted: false,
            lease_lost: false,
            remaining,
        }
    }

    pub fn synced(&self) -> usize {
        match self.outcome {
            DrainOutcome::Skipped(_) => 0,
            DrainOutcome::Complete { synced } | DrainOutcome::Partial { synced, .. } => synced,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Complete { .. })
    }

    /// User-facing message for this outcome.
    pub fn notification(&self) -> String {
        match &self.outcome {
            DrainOutcome::Skipped(SkipReason::Offline) => {
                if self.remaining == 0 {
                    "Offline. Nothing is waiting to sync.".to_string()
                } else {
                    format!(
                        "Offline. {} pending action{} will sync when the connection returns.",
                        self.remaining,
                        plural(self.remaining)
                    )
                }
            }
            DrainOutcome::Skipped(SkipReason::EmptyQueue) => "Nothing to sync.".to_string(),
            DrainOutcome::Skipped(SkipReason::LeaseHeld { .. }) => {
                "Another instance is syncing right now. Try again shortly.".to_string()
            }
            DrainOutcome::Complete { synced } => {
                format!("All {} pending action{} synced.", synced, plural(*synced))
            }
            DrainOutcome::Partial { synced, total } => {
                let prefix = if self.lease_lost {
                    "Another instance took over syncing. "
                } else if self.interrupted {
                    "Connection lost. "
                } else {
                    ""
                };
                format!(
                    "{}Synced {} of {} pending action{}. {} will retry on the next sync.",
                    prefix,
                    synced,
                    total,
                    plural(*total),
                    self.remaining
                )
            }
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Drains the [`PendingQueue`] whenever asked and online.
pub struct SyncCoordinator {
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<Mutex<PendingQueue>>,
    api: Arc<dyn RemoteApi>,
    dispatch: DispatchTable,
    lease: Option<DrainLease>,
    state: watch::Sender<DrainState>,
    drain_guard: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        queue: Arc<Mutex<PendingQueue>>,
        api: Arc<dyn RemoteApi>,
        dispatch: DispatchTable,
    ) -> Self {
        let (state, _) = watch::channel(DrainState::Idle);
        Self {
            monitor,
            queue,
            api,
            dispatch,
            lease: None,
            state,
            drain_guard: Mutex::new(()),
        }
    }

    /// Requires holding `lease` for every drain.
    pub fn with_lease(mut self, lease: DrainLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn queue(&self) -> &Arc<Mutex<PendingQueue>> {
        &self.queue
    }

    pub fn state(&self) -> DrainState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DrainState> {
        self.state.subscribe()
    }

    /// Sends every unsynced item to its endpoint, in order.
    ///
    /// Overlapping calls wait for each other, so an item is never dispatched
    /// twice by the same coordinator.
    pub async fn drain(&self) -> Result<DrainReport, SyncError> {
        let _guard = self.drain_guard.lock().await;

        let pending: Vec<PendingMutation> = {
            let queue = self.queue.lock().await;
            queue.list().iter().filter(|m| !m.synced).cloned().collect()
        };

        if !self.monitor.is_online() {
            tracing::debug!("Drain skipped: offline");
            return Ok(DrainReport::skipped(SkipReason::Offline, pending.len()));
        }
        if pending.is_empty() {
            return Ok(DrainReport::skipped(SkipReason::EmptyQueue, 0));
        }

        if let Some(lease) = &self.lease {
            if let LeaseStatus::HeldBy { owner, expires_at } = lease.try_acquire()? {
                tracing::info!(%owner, "Drain skipped: lease held by another instance");
                return Ok(DrainReport::skipped(
                    SkipReason::LeaseHeld { owner, expires_at },
                    pending.len(),
                ));
            }
        }

        self.state.send_replace(DrainState::Draining);
        let result = self.dispatch_all(&pending).await;
        self.state.send_replace(DrainState::Idle);

        if let Some(lease) = &self.lease {
            if let Err(e) = lease.release() {
                tracing::warn!("Failed to release drain lease: {}", e);
            }
        }

        let report = result?;
        tracing::info!(
            synced = report.synced(),
            failed = report.failures.len(),
            remaining = report.remaining,
            "{}",
            report.notification()
        );
        Ok(report)
    }

    async fn dispatch_all(&self, pending: &[PendingMutation]) -> Result<DrainReport, SyncError> {
        let total = pending.len();
        let mut synced = 0;
        let mut failures = Vec::new();
        let mut interrupted = false;
        let mut lease_lost = false;

        for (index, mutation) in pending.iter().enumerate() {
            if index > 0 && !self.monitor.is_online() {
                tracing::warn!(
                    "Went offline during drain, {} action(s) left unsent",
                    total - index
                );
                interrupted = true;
                break;
            }
            if index > 0 && !self.renew_lease() {
                tracing::warn!(
                    "Lost drain lease, {} action(s) left for the other instance",
                    total - index
                );
                interrupted = true;
                lease_lost = true;
                break;
            }

            match self.dispatch_one(mutation).await {
                Ok(()) => {
                    self.queue.lock().await.mark_synced(&mutation.id);
                    synced += 1;
                }
                Err(failure) => {
                    self.queue
                        .lock()
                        .await
                        .record_failure(&mutation.id, failure.message.clone());
                    failures.push(failure);
                }
            }
        }

        let remaining = {
            let mut queue = self.queue.lock().await;
            queue.remove_synced()?;
            queue.len()
        };

        let outcome = if synced == total {
            DrainOutcome::Complete { synced }
        } else {
            DrainOutcome::Partial { synced, total }
        };

        Ok(DrainReport {
            outcome,
            failures,
            interrupted,
            lease_lost,
            remaining,
        })
    }

    /// Extends the lease before the next item. Returns false once another
    /// owner holds it or it can't be written.
    fn renew_lease(&self) -> bool {
        let Some(lease) = &self.lease else {
            return true;
        };
        match lease.try_acquire() {
            Ok(LeaseStatus::Acquired) => true,
            Ok(LeaseStatus::HeldBy { owner, .. }) => {
                tracing::info!(%owner, "Drain lease taken by another instance");
                false
            }
            Err(e) => {
                tracing::warn!("Failed to renew drain lease: {}", e);
                false
            }
        }
    }

    async fn dispatch_one(&self, mutation: &PendingMutation) -> Result<(), DispatchFailure> {
        let endpoint = self
            .dispatch
            .resolve(mutation.mutation_type)
            .map_err(|e| {
                tracing::warn!(id = %mutation.id, "{}", e);
                DispatchFailure::configuration(mutation, &e)
            })?;

        tracing::debug!(id = %mutation.id, endpoint, "Sending queued {}", mutation.mutation_type);

        self.api
            .post(endpoint, &mutation.payload)
            .await
            .map_err(|e| {
                tracing::warn!(id = %mutation.id, "Failed to sync '{}': {}", mutation.title, e);
                DispatchFailure::network(mutation, &e)
            })
    }
}
