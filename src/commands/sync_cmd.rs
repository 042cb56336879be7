//! Sync CLI commands for sending queued actions to the backend.

use clap::{Args, Subcommand};

use caresync_core::{Connectivity, DrainOutcome, FailureKind, SyncError};

use crate::config::Config;
use crate::sync::Session;

/// Send pending actions to the backend
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and backend status
    Status,
}

impl SyncCommand {
    pub async fn run(&self, session: &Session, config: &Config) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.sync(session, config).await,
            Some(SyncSubcommand::Status) => self.status(session, config).await,
        }
    }

    async fn sync(&self, session: &Session, config: &Config) -> Result<(), SyncCommandError> {
        if !config.api.is_configured() {
            return Err(SyncCommandError::NotConfigured);
        }

        if session.detect().await == Connectivity::Offline {
            let pending = session.offline.pending().await.len();
            println!("Server unreachable.");
            println!("{} action(s) kept offline until the next sync.", pending);
            return Ok(());
        }

        println!("Syncing with server...");
        println!();

        let report = session.offline.drain().await?;

        for failure in &report.failures {
            let reason = match failure.kind {
                FailureKind::Network { retryable: true } => "will retry",
                FailureKind::Network { retryable: false } => "rejected",
                FailureKind::Configuration => "no endpoint",
            };
            println!(
                "  ✗ {} '{}' ({}): {}",
                failure.mutation_type, failure.title, reason, failure.message
            );
        }
        if let DrainOutcome::Complete { synced } | DrainOutcome::Partial { synced, .. } =
            report.outcome
        {
            if synced > 0 {
                println!("  ✓ {} action{} sent", synced, if synced == 1 { "" } else { "s" });
            }
            println!();
        }

        println!("{}", report.notification());
        Ok(())
    }

    async fn status(&self, session: &Session, config: &Config) -> Result<(), SyncCommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        let Some(base_url) = config.api.base_url.as_ref() else {
            println!("Status: Not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  api:");
            println!("    base_url: \"http://localhost:3000\"");
            println!("    api_key: \"your-api-key\"");
            println!();
            println!("Or set environment variables:");
            println!("  CARESYNC_API_URL");
            println!("  CARESYNC_API_KEY");
            return Ok(());
        };

        println!("Server:    {}", base_url);
        match &config.api.api_key {
            Some(key) => println!("API Key:   {}...", key_prefix(key)),
            None => println!("API Key:   (none)"),
        }
        println!(
            "Auto-sync: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!("Pending:   {}", session.offline.pending().await.len());
        let unreadable = session.offline.unreadable().await;
        if unreadable > 0 {
            println!(
                "Unreadable: {} stored action(s) kept but not sent (run 'caresync queue clear' to discard)",
                unreadable
            );
        }
        println!();

        print!("Server status: ");
        match session.detect().await {
            Connectivity::Online => println!("✓ reachable"),
            Connectivity::Offline => println!("✗ unreachable"),
        }

        Ok(())
    }
}

/// First eight characters of the API key, for display.
fn key_prefix(key: &str) -> String {
    key.chars().take(8).collect()
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    NotConfigured,
    SyncError(SyncError),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::NotConfigured => write!(
                f,
                "Sync not configured. Set api.base_url in config or CARESYNC_API_URL."
            ),
            SyncCommandError::SyncError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::NotConfigured => None,
            SyncCommandError::SyncError(e) => Some(e),
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::SyncError(e)
    }
}
