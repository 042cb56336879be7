//! Foreground connectivity watcher with automatic sync.

use std::time::Duration;

use clap::Args;

use caresync_core::{spawn_auto_sync, Connectivity, QueueEvent};

use crate::config::Config;
use crate::sync::Session;

/// Watch connectivity and sync whenever the backend comes back
#[derive(Args)]
pub struct WatchCommand {
    /// Seconds between reachability checks (defaults to sync.poll_interval_secs)
    #[arg(long, short)]
    interval: Option<u64>,
}

impl WatchCommand {
    pub async fn run(&self, session: &Session, config: &Config) -> Result<(), WatchCommandError> {
        if !config.api.is_configured() {
            return Err(WatchCommandError::NotConfigured);
        }

        let interval = Duration::from_secs(
            self.interval
                .unwrap_or(config.sync.poll_interval_secs)
                .max(1),
        );
        let monitor = session.offline.monitor().clone();

        let printer = monitor.on_change(|state| match state {
            Connectivity::Online => println!("● online"),
            Connectivity::Offline => println!("○ offline, actions will be queued"),
        });
        let queue_printer = session.offline.coordinator().queue().lock().await.on_change(
            |event| {
                if let QueueEvent::SyncedRemoved { removed, pending } = event {
                    if removed > 0 {
                        println!("  ✓ sent {} action(s), {} still pending", removed, pending);
                    }
                }
            },
        );
        // Subscribed before the first probe so the initial Online transition drains
        let agent = spawn_auto_sync(session.offline.coordinator().clone());
        let poller = monitor.clone().watch(session.probe(), interval);

        println!(
            "Watching {} every {}s. Press Ctrl-C to stop.",
            config.api.base_url.as_deref().unwrap_or_default(),
            interval.as_secs()
        );

        tokio::signal::ctrl_c()
            .await
            .map_err(WatchCommandError::SignalError)?;

        poller.abort();
        agent.abort();
        printer.abort();
        queue_printer.abort();

        let pending = session.offline.pending().await.len();
        println!();
        println!("Stopped. {} action(s) pending.", pending);
        Ok(())
    }
}

/// Errors from the watch command
#[derive(Debug)]
pub enum WatchCommandError {
    NotConfigured,
    SignalError(std::io::Error),
}

impl std::fmt::Display for WatchCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchCommandError::NotConfigured => write!(
                f,
                "Sync not configured. Set api.base_url in config or CARESYNC_API_URL."
            ),
            WatchCommandError::SignalError(e) => write!(f, "Failed to listen for Ctrl-C: {}", e),
        }
    }
}

impl std::error::Error for WatchCommandError {}
