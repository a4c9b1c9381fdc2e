// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Domain-level mutations awaiting remote confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP verb for a deferred call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A resolved remote route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
}

/// Kinds of booking status transitions a user can make offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Accept,
    Reject,
    Complete,
    Cancel,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Accept,
        ActionType::Reject,
        ActionType::Complete,
        ActionType::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Accept => "accept",
            ActionType::Reject => "reject",
            ActionType::Complete => "complete",
            ActionType::Cancel => "cancel",
        }
    }

    /// Remote route handling this transition for the given booking.
    pub fn endpoint(&self, subject_id: &str) -> Route {
        let subject = urlencoding::encode(subject_id);
        let (method, path) = match self {
            ActionType::Accept => (HttpMethod::Patch, format!("/bookings/{}/accept", subject)),
            ActionType::Reject => (HttpMethod::Patch, format!("/bookings/{}/reject", subject)),
            ActionType::Complete => (HttpMethod::Patch, format!("/bookings/{}/complete", subject)),
            ActionType::Cancel => (HttpMethod::Patch, format!("/bookings/{}/cancel", subject)),
        };
        Route { method, path }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown action type: {}", s))
    }
}

/// A mutation recorded locally and not yet confirmed by the server.
///
/// Fields are private; once built the action is only ever read or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    id: String,
    #[serde(rename = "type")]
    action_type: ActionType,
    subject_id: String,
    #[serde(default)]
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(
        action_type: ActionType,
        subject_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_type,
            subject_id: subject_id.into(),
            payload,
            created_at: crate::time_utils::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn route(&self) -> Route {
        self.action_type.endpoint(&self.subject_id)
    }
}
