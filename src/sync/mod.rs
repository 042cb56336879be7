//! Glue between CLI configuration and the offline subsystem.

mod auto_sync;
mod session;

pub use auto_sync::try_auto_sync;
pub use session::{Session, SessionError};
