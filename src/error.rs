// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types shared by the queue store, gateway and coordinators.

/// Crate-wide error type.
///
/// Remote failures are split by how the sync layer reacts to them:
/// transient ones leave the entry queued, auth ones go through the
/// refresh coordinator, and `SessionExpired` tears the session down.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authorization rejected by remote API")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,

    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Server error with status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// True for failures that may succeed on a later attempt without any
    /// change to the request (connectivity loss, 5xx).
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Server { .. })
    }

    /// True for any authorization-related failure.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Unauthorized | SyncError::SessionExpired)
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, SyncError::SessionExpired)
    }

    /// HTTP status carried by the error, if the remote API produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SyncError::Unauthorized => Some(401),
            SyncError::Rejected { status, .. } | SyncError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
