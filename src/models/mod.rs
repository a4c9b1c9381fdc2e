// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for queued mutations, credentials and sync state.

pub mod action;
pub mod credentials;
pub mod queue;
pub mod sync;

pub use action::{ActionType, HttpMethod, PendingAction, Route};
pub use credentials::CredentialSet;
pub use queue::{EntryKind, OfflineQueueItem, QueueEntry};
pub use sync::{DeadLetter, SyncMetadata, SyncStatus};
