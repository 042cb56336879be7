//! Cache CLI commands for the offline copy of reference data.

use chrono::{Duration, Local, Utc};
use clap::{Args, Subcommand};

use caresync_core::{CachedSnapshot, Connectivity, SyncError};

use super::OutputFormat;
use crate::sync::Session;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Download pharmacies, doctors, profile and emergency contacts
    Refresh,

    /// Show the cached data
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete the cached data
    Clear,
}

impl CacheCommand {
    pub async fn run(&self, session: &mut Session) -> Result<(), CacheCommandError> {
        match &self.command {
            CacheSubcommand::Refresh => {
                // Refreshing offline would replace good data with empty lists
                if session.detect().await == Connectivity::Offline {
                    println!("Server unreachable. Keeping the existing cache.");
                    return Ok(());
                }

                let report = session.offline.refresh_cache().await?;
                println!("Cache refreshed.");
                println!();
                print_summary(&report.snapshot);
                if !report.is_complete() {
                    println!();
                    for kind in &report.failed {
                        println!("  ✗ {} could not be fetched (stored empty)", kind);
                    }
                }
                Ok(())
            }
            CacheSubcommand::Show { format } => {
                let Some(snapshot) = session.offline.load_cache()? else {
                    println!("Nothing cached yet. Run 'caresync cache refresh' while online.");
                    return Ok(());
                };
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(snapshot)?);
                    }
                    OutputFormat::Text => print_summary(snapshot),
                }
                Ok(())
            }
            CacheSubcommand::Clear => {
                if session.offline.clear_cache()? {
                    println!("Cache cleared.");
                } else {
                    println!("Cache was already empty.");
                }
                Ok(())
            }
        }
    }
}

fn print_summary(snapshot: &CachedSnapshot) {
    println!(
        "Last update:        {} ({})",
        snapshot
            .last_update
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M"),
        describe_age(snapshot.age(Utc::now()))
    );
    println!("Pharmacies:         {}", snapshot.pharmacies.len());
    println!("Doctors:            {}", snapshot.doctors.len());
    println!(
        "User profile:       {}",
        if snapshot.user_profile.is_some() {
            "cached"
        } else {
            "none"
        }
    );
    println!("Emergency contacts: {}", snapshot.emergency_contacts.len());
}

fn describe_age(age: Duration) -> String {
    if age < Duration::minutes(1) {
        "just now".to_string()
    } else if age < Duration::hours(1) {
        format!("{} min ago", age.num_minutes())
    } else if age < Duration::days(1) {
        format!("{} h ago", age.num_hours())
    } else {
        format!("{} days ago", age.num_days())
    }
}

/// Errors from cache commands
#[derive(Debug)]
pub enum CacheCommandError {
    SyncError(SyncError),
    JsonError(serde_json::Error),
}

impl std::fmt::Display for CacheCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheCommandError::SyncError(e) => write!(f, "{}", e),
            CacheCommandError::JsonError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CacheCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheCommandError::SyncError(e) => Some(e),
            CacheCommandError::JsonError(e) => Some(e),
        }
    }
}

impl From<SyncError> for CacheCommandError {
    fn from(e: SyncError) -> Self {
        CacheCommandError::SyncError(e)
    }
}

impl From<serde_json::Error> for CacheCommandError {
    fn from(e: serde_json::Error) -> Self {
        CacheCommandError::JsonError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_age() {
        assert_eq!(describe_age(Duration::seconds(5)), "just now");
        assert_eq!(describe_age(Duration::minutes(12)), "12 min ago");
        assert_eq!(describe_age(Duration::hours(3)), "3 h ago");
        assert_eq!(describe_age(Duration::days(2)), "2 days ago");
    }
}
