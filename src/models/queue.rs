// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entries of the durable sync queue.
//!
//! Domain actions and generic deferred calls share one ordered queue and
//! are told apart by the `kind` tag.

use crate::models::action::{ActionType, HttpMethod, PendingAction, Route};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A protocol-agnostic deferred HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueItem {
    pub id: String,
    /// Verb tag describing the call (e.g. "rate", "upload_receipt")
    pub action: String,
    /// Logical route relative to the API base URL
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OfflineQueueItem {
    pub fn new(
        action: impl Into<String>,
        method: HttpMethod,
        endpoint: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.into(),
            endpoint: endpoint.into(),
            method,
            payload,
            created_at: crate::time_utils::now(),
        }
    }

    /// The domain action type this call shadows, if its tag names one.
    ///
    /// Such calls duplicate work already done on the action path.
    pub fn shadowed_action_type(&self) -> Option<ActionType> {
        self.action.parse().ok()
    }

    pub fn route(&self) -> Route {
        Route {
            method: self.method,
            path: self.endpoint.clone(),
        }
    }
}

/// Discriminator for [`QueueEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Action,
    Call,
}

/// One record in the durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueEntry {
    Action(PendingAction),
    Call(OfflineQueueItem),
}

impl QueueEntry {
    pub fn id(&self) -> &str {
        match self {
            QueueEntry::Action(action) => action.id(),
            QueueEntry::Call(item) => &item.id,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            QueueEntry::Action(_) => EntryKind::Action,
            QueueEntry::Call(_) => EntryKind::Call,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            QueueEntry::Action(action) => action.created_at(),
            QueueEntry::Call(item) => item.created_at,
        }
    }

    /// Short label for log fields.
    pub fn label(&self) -> &str {
        match self {
            QueueEntry::Action(action) => action.action_type().as_str(),
            QueueEntry::Call(item) => &item.action,
        }
    }
}

impl From<PendingAction> for QueueEntry {
    fn from(action: PendingAction) -> Self {
        QueueEntry::Action(action)
    }
}

impl From<OfflineQueueItem> for QueueEntry {
    fn from(item: OfflineQueueItem) -> Self {
        QueueEntry::Call(item)
    }
}
