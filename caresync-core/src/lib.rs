//! CareSync Core Library
//!
//! Offline-first storage and synchronization: a cached snapshot of reference
//! data, a durable queue of user actions made while offline, and the
//! coordinator that replays that queue once the network returns.

pub mod accountant;
pub mod agent;
pub mod api;
pub mod cache;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod lease;
pub mod models;
pub mod offline;
pub mod queue;
pub mod store;

#[cfg(test)]
mod testing;

pub use accountant::{StorageAccountant, StorageUsage};
pub use agent::spawn_auto_sync;
pub use api::{
    ApiError, DispatchError, DispatchTable, HttpApi, ReachabilityProbe, RefreshSources, RemoteApi,
};
pub use cache::{LocalCache, RefreshReport};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use coordinator::{
    DispatchFailure, DrainOutcome, DrainReport, DrainState, FailureKind, SkipReason,
    SyncCoordinator,
};
pub use error::SyncError;
pub use lease::{DrainLease, LeaseStatus, MAX_LEASE_TTL_SECS};
pub use models::{CachedSnapshot, MutationType, PendingMutation, Reference, ReferenceKind};
pub use offline::{OfflineOptions, OfflineSync};
pub use queue::{PendingQueue, QueueEvent};
pub use store::{DurableStore, FileStore, MemoryStore, Namespace, StorageError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
