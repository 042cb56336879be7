//! Queue CLI commands for recording actions while offline.

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use caresync_core::{MutationType, PendingMutation, SyncError};

use super::OutputFormat;
use crate::config::Config;
use crate::sync::{try_auto_sync, Session};

#[derive(Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    pub command: QueueSubcommand,
}

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// Queue an action to send when the backend is reachable
    Add {
        /// Action type (appointment, document, message, review)
        #[arg(value_name = "TYPE")]
        mutation_type: MutationType,

        /// Short description shown in listings
        title: String,

        /// JSON request body
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Read the JSON request body from a file
        #[arg(long, value_name = "PATH")]
        payload_file: Option<PathBuf>,
    },

    /// List actions waiting to be sent
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Discard every pending action
    Clear,
}

impl QueueCommand {
    pub async fn run(&self, session: &Session, config: &Config) -> Result<(), QueueCommandError> {
        match &self.command {
            QueueSubcommand::Add {
                mutation_type,
                title,
                payload,
                payload_file,
            } => {
                let body = read_payload(title, payload.as_deref(), payload_file.as_deref())?;
                let item = session
                    .offline
                    .enqueue(*mutation_type, title.clone(), body)
                    .await?;

                println!("Queued {} '{}'", item.mutation_type, item.title);
                println!("  ID: {}", item.id);

                try_auto_sync(session, config).await;

                let pending = session.offline.pending().await.len();
                println!("{} action{} pending.", pending, plural(pending));
                Ok(())
            }
            QueueSubcommand::List { format } => {
                let pending = session.offline.pending().await;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&pending)?);
                    }
                    OutputFormat::Text => {
                        if pending.is_empty() {
                            println!("No pending actions.");
                        } else {
                            for item in &pending {
                                println!("{}", format_item(item));
                            }
                            println!();
                            println!("{} action{} pending.", pending.len(), plural(pending.len()));
                        }
                    }
                }
                Ok(())
            }
            QueueSubcommand::Clear => {
                let count = session.offline.pending().await.len();
                session.offline.clear_queue().await?;
                println!("Discarded {} pending action{}.", count, plural(count));
                Ok(())
            }
        }
    }
}

/// Resolves the request body from `--payload`, `--payload-file` or the title.
fn read_payload(
    title: &str,
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<Value, QueueCommandError> {
    let raw = match (inline, file) {
        (Some(raw), _) => raw.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| QueueCommandError::ReadError(path.to_path_buf(), e))?,
        (None, None) => return Ok(json!({ "title": title })),
    };

    serde_json::from_str(&raw).map_err(|e| QueueCommandError::InvalidPayload(e.to_string()))
}

fn format_item(item: &PendingMutation) -> String {
    let mut line = format!(
        "{}  {:<12} {}",
        item.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        item.mutation_type,
        item.title
    );
    if item.attempts > 0 {
        line.push_str(&format!(
            "  ({} failed attempt{}",
            item.attempts,
            plural(item.attempts as usize)
        ));
        if let Some(err) = &item.last_error {
            line.push_str(&format!(": {}", err));
        }
        line.push(')');
    }
    line
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Errors from queue commands
#[derive(Debug)]
pub enum QueueCommandError {
    InvalidPayload(String),
    ReadError(PathBuf, std::io::Error),
    JsonError(serde_json::Error),
    SyncError(SyncError),
}

impl std::fmt::Display for QueueCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueCommandError::InvalidPayload(e) => write!(f, "Payload is not valid JSON: {}", e),
            QueueCommandError::ReadError(path, e) => {
                write!(f, "Failed to read payload file '{}': {}", path.display(), e)
            }
            QueueCommandError::JsonError(e) => write!(f, "{}", e),
            QueueCommandError::SyncError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QueueCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueCommandError::ReadError(_, e) => Some(e),
            QueueCommandError::JsonError(e) => Some(e),
            QueueCommandError::SyncError(e) => Some(e),
            QueueCommandError::InvalidPayload(_) => None,
        }
    }
}

impl From<SyncError> for QueueCommandError {
    fn from(e: SyncError) -> Self {
        QueueCommandError::SyncError(e)
    }
}

impl From<serde_json::Error> for QueueCommandError {
    fn from(e: serde_json::Error) -> Self {
        QueueCommandError::JsonError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_payload_defaults_to_title() {
        let body = read_payload("Dr. Lee visit", None, None).unwrap();
        assert_eq!(body, json!({"title": "Dr. Lee visit"}));
    }

    #[test]
    fn test_inline_payload() {
        let body = read_payload("x", Some(r#"{"rating": 4}"#), None).unwrap();
        assert_eq!(body, json!({"rating": 4}));
    }

    #[test]
    fn test_payload_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("body.json");
        std::fs::write(&path, r#"{"doctorId": 12, "slot": "09:30"}"#).unwrap();

        let body = read_payload("x", None, Some(&path)).unwrap();
        assert_eq!(body["doctorId"], 12);
    }

    #[test]
    fn test_invalid_payload() {
        let err = read_payload("x", Some("{rating"), None).unwrap_err();
        assert!(err.to_string().starts_with("Payload is not valid JSON"));
    }

    #[test]
    fn test_missing_payload_file() {
        let temp_dir = tempdir().unwrap();
        let err = read_payload("x", None, Some(&temp_dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, QueueCommandError::ReadError(..)));
    }

    #[test]
    fn test_format_item_with_failures() {
        let mut item = PendingMutation::new(MutationType::Review, "Pharmacy", json!({}));
        assert!(!format_item(&item).contains("failed"));

        item.attempts = 2;
        item.last_error = Some("HTTP 500".to_string());
        let line = format_item(&item);
        assert!(line.contains("review"));
        assert!(line.ends_with("(2 failed attempts: HTTP 500)"));
    }
}
