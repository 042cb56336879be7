use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of user action recorded in the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationType {
    Appointment,
    Document,
    Message,
    Review,
}

impl MutationType {
    pub const ALL: [MutationType; 4] = [
        MutationType::Appointment,
        MutationType::Document,
        MutationType::Message,
        MutationType::Review,
    ];
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationType::Appointment => write!(f, "appointment"),
            MutationType::Document => write!(f, "document"),
            MutationType::Message => write!(f, "message"),
            MutationType::Review => write!(f, "review"),
        }
    }
}

impl FromStr for MutationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "appointment" => Ok(MutationType::Appointment),
            "document" => Ok(MutationType::Document),
            "message" => Ok(MutationType::Message),
            "review" => Ok(MutationType::Review),
            _ => Err(format!(
                "Invalid action type '{}'. Valid options: appointment, document, message, review",
                s
            )),
        }
    }
}

/// A user-issued write kept locally until the remote API confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub id: String,
    #[serde(rename = "type")]
    pub mutation_type: MutationType,
    pub title: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub synced: bool,
    /// Failed dispatch attempts so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingMutation {
    pub fn new(mutation_type: MutationType, title: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mutation_type,
            title: title.into(),
            payload,
            created_at: Utc::now(),
            synced: false,
            attempts: 0,
            last_error: None,
        }
    }
}

impl fmt::Display for PendingMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({})",
            self.mutation_type,
            self.title,
            self.created_at.format("%Y-%m-%d %H:%M")
        )?;
        if self.attempts > 0 {
            write!(
                f,
                " - {} failed attempt{}",
                self.attempts,
                if self.attempts == 1 { "" } else { "s" }
            )?;
        }
        Ok(())
    }
}
