//! Saga record for router-control side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery state of a router command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Confirmed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Confirmed => "confirmed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "confirmed" => CommandStatus::Confirmed,
            "failed" => CommandStatus::Failed,
            _ => CommandStatus::Pending,
        }
    }
}

/// An intended router-side action, recorded in the same transaction as the
/// state change that requires it. The external call happens after commit
/// and confirms the record, or marks it failed for retry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RouterCommand {
    pub command_id: Uuid,
    pub customer_id: Uuid,
    pub action: String,
    pub router_name: String,
    pub secret_name: String,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
