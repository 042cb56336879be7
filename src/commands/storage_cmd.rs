//! Storage usage and wipe commands.

use std::io::{self, Write};

use clap::Args;

use caresync_core::{StorageUsage, SyncError};

use super::OutputFormat;
use crate::sync::Session;

/// Show how much offline storage is in use
#[derive(Args)]
pub struct UsageCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl UsageCommand {
    pub fn run(&self, session: &Session) -> Result<(), StorageCommandError> {
        let usage = session.offline.usage()?;
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&usage)?),
            OutputFormat::Text => {
                println!("Offline storage");
                println!("===============");
                println!();
                println!("{}", usage_bar(&usage, 30));
                println!("{}", usage);
                if usage.is_near_capacity() {
                    println!();
                    println!("Storage is nearly full. Run 'caresync sync' or 'caresync cache clear'.");
                }
            }
        }
        Ok(())
    }
}

/// Delete cached data and every pending action
#[derive(Args)]
pub struct ClearCommand {
    /// Skip the confirmation prompt
    #[arg(long, short)]
    force: bool,
}

impl ClearCommand {
    pub async fn run(&self, session: &mut Session) -> Result<(), StorageCommandError> {
        let pending = session.offline.pending().await.len();
        if !self.force && !confirm(pending)? {
            println!("Cancelled.");
            return Ok(());
        }

        session.offline.clear_all().await?;
        println!("✓ Cleared offline cache");
        println!("✓ Discarded {} pending action(s)", pending);
        Ok(())
    }
}

fn confirm(pending: usize) -> Result<bool, StorageCommandError> {
    if pending > 0 {
        println!("{} action(s) have not been sent yet and will be lost.", pending);
    }
    print!("Delete all offline data? [y/N] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn usage_bar(usage: &StorageUsage, width: usize) -> String {
    let filled = ((usage.percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Errors from storage commands
#[derive(Debug)]
pub enum StorageCommandError {
    SyncError(SyncError),
    JsonError(serde_json::Error),
    IoError(io::Error),
}

impl std::fmt::Display for StorageCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageCommandError::SyncError(e) => write!(f, "{}", e),
            StorageCommandError::JsonError(e) => write!(f, "{}", e),
            StorageCommandError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageCommandError {}

impl From<SyncError> for StorageCommandError {
    fn from(e: SyncError) -> Self {
        StorageCommandError::SyncError(e)
    }
}

impl From<serde_json::Error> for StorageCommandError {
    fn from(e: serde_json::Error) -> Self {
        StorageCommandError::JsonError(e)
    }
}

impl From<io::Error> for StorageCommandError {
    fn from(e: io::Error) -> Self {
        StorageCommandError::IoError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caresync_core::{DurableStore, MemoryStore, Namespace, StorageAccountant};
    use std::sync::Arc;

    fn usage_at(used: usize, capacity: u64) -> StorageUsage {
        let store = Arc::new(MemoryStore::new());
        if used > 0 {
            store.set("caresync:pending-queue", &"x".repeat(used)).unwrap();
        }
        StorageAccountant::new(store, Namespace::default())
            .with_capacity(capacity)
            .usage()
            .unwrap()
    }

    #[test]
    fn test_usage_bar() {
        assert_eq!(usage_bar(&usage_at(0, 100), 10), "[----------]");
        assert_eq!(usage_bar(&usage_at(50, 100), 10), "[#####-----]");
        assert_eq!(usage_bar(&usage_at(500, 100), 10), "[##########]");
    }
}
