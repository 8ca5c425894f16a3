//! User-visible notifications emitted for every terminal intent outcome (spec §7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of terminal outcome a notification reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    Copied { executed_notional: String },
    Skipped { reason: String },
    Failed { reason: String },
}

/// A single notification about a follower's copy intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub follower_address: String,
    pub intent_id: Uuid,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}
