use thiserror::Error;

use crate::api::ApiError;
use crate::store::StorageError;

/// Errors surfaced by the subsystem to its host.
///
/// Per-item dispatch failures and per-collection fetch failures are not
/// errors at this level; they are reported in the drain and refresh results.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("API client error: {0}")]
    Api(#[from] ApiError),
}
