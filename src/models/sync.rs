//! Sync bookkeeping and the live status published to the UI.

use crate::models::queue::QueueEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scalar sync metadata persisted next to the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// End of the last completed drain (`None` = never synced)
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Failed attempts per entry id, only tracked when a retry ceiling is set
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attempts: HashMap<String, u32>,
}

/// An entry set aside after exhausting its retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub entry: QueueEntry,
    pub attempts: u32,
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Snapshot of the counters the UI renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Domain actions awaiting confirmation
    pub pending_count: usize,
    /// Generic deferred calls awaiting confirmation
    pub queue_count: usize,
    pub dead_letter_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_syncing: bool,
    pub is_online: bool,
}
