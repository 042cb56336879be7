//! Auto-sync for CLI write commands.
//!
//! Drains the pending queue after a write when `sync.auto_sync` is enabled
//! and the backend answers its health check.

use caresync_core::Connectivity;

use crate::config::Config;

use super::Session;

/// Performs a best-effort drain if enabled and the backend is reachable.
///
/// Failures are reported on stderr and otherwise ignored; the action stays
/// queued for the next `caresync sync`.
pub async fn try_auto_sync(session: &Session, config: &Config) {
    if !config.sync.auto_sync || !config.api.is_configured() {
        return;
    }

    // Check reachability first (fast fail)
    if session.detect().await != Connectivity::Online {
        eprintln!("Auto-sync: server unreachable, action kept offline");
        return;
    }

    match session.offline.drain().await {
        Ok(report) => {
            if !report.failures.is_empty() {
                eprintln!("Auto-sync: {}", report.notification());
            }
        }
        Err(e) => eprintln!("Auto-sync: {}", e),
    }
}
