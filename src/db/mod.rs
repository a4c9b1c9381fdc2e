// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: key-value substrate, durable queue and credentials.

pub mod credential_store;
pub mod kv;
pub mod queue_store;

pub use credential_store::CredentialStore;
pub use kv::{FileKv, KvStore, MemoryKv};
pub use queue_store::QueueStore;

/// Storage keys as constants.
pub mod keys {
    /// Ordered queue of pending actions and deferred calls
    pub const QUEUE: &str = "sync_queue";
    pub const DEAD_LETTERS: &str = "sync_dead_letters";
    pub const METADATA: &str = "sync_metadata";
    pub const CREDENTIALS: &str = "credentials";
}
