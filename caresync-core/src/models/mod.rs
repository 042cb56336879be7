mod mutation;
mod snapshot;

pub use mutation::{MutationType, PendingMutation};
pub use snapshot::{CachedSnapshot, Reference, ReferenceKind};
