// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable queue store with typed operations.
//!
//! Provides:
//! - The ordered sync queue (pending actions and deferred calls)
//! - Sync metadata (last sync time, attempt counters)
//! - Dead-lettered entries
//!
//! Every mutating call persists before returning. Read-modify-write cycles
//! are serialized by one lock, so an `add` racing a drain's `remove` cannot
//! lose either update. The lock also guards a revision number bumped by each
//! queue or dead-letter mutation; `counts` reports it so that callers can
//! discard counts overtaken by a later mutation.

use crate::db::keys;
use crate::db::kv::KvStore;
use crate::error::Result;
use crate::models::{DeadLetter, EntryKind, QueueEntry, SyncMetadata};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry counts derived from the live collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub calls: usize,
    pub dead_letters: usize,
    /// Store revision the counts were taken at
    pub revision: u64,
}

/// Durable queue store.
pub struct QueueStore {
    kv: Arc<dyn KvStore>,
    /// Write lock; the value counts queue and dead-letter mutations.
    revision: Mutex<u64>,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            revision: Mutex::new(0),
        }
    }

    // ─── Queue Operations ────────────────────────────────────────

    /// All queued entries in insertion order.
    pub async fn list(&self) -> Result<Vec<QueueEntry>> {
        self.load(keys::QUEUE).await
    }

    /// Append an entry. An entry whose id is already queued is ignored.
    pub async fn add(&self, entry: QueueEntry) -> Result<()> {
        let mut revision = self.revision.lock().await;

        let mut entries: Vec<QueueEntry> = self.load(keys::QUEUE).await?;
        if entries.iter().any(|e| e.id() == entry.id()) {
            tracing::debug!(item_id = entry.id(), "Entry already queued, ignoring");
            return Ok(());
        }
        entries.push(entry);
        self.persist(keys::QUEUE, &entries).await?;
        *revision += 1;
        Ok(())
    }

    /// Remove an entry by id. Returns whether anything was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut revision = self.revision.lock().await;

        let mut entries: Vec<QueueEntry> = self.load(keys::QUEUE).await?;
        let before = entries.len();
        entries.retain(|e| e.id() != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(keys::QUEUE, &entries).await?;
        *revision += 1;
        Ok(true)
    }

    /// Drop every queued entry.
    pub async fn clear(&self) -> Result<()> {
        let mut revision = self.revision.lock().await;
        self.kv.remove(keys::QUEUE).await?;
        *revision += 1;
        Ok(())
    }

    // ─── Metadata Operations ─────────────────────────────────────

    pub async fn metadata(&self) -> Result<SyncMetadata> {
        Ok(self
            .kv
            .get(keys::METADATA)
            .await?
            .map(|raw| serde_json::from_str::<SyncMetadata>(&raw))
            .transpose()?
            .unwrap_or_default())
    }

    /// Apply `patch` to the stored metadata and persist the result.
    pub async fn set_metadata<F>(&self, patch: F) -> Result<SyncMetadata>
    where
        F: FnOnce(&mut SyncMetadata),
    {
        let _guard = self.revision.lock().await;

        let mut metadata = self.metadata().await?;
        patch(&mut metadata);
        self.kv
            .set(keys::METADATA, serde_json::to_string(&metadata)?)
            .await?;
        Ok(metadata)
    }

    pub async fn clear_metadata(&self) -> Result<()> {
        let _guard = self.revision.lock().await;
        self.kv.remove(keys::METADATA).await
    }

    // ─── Dead Letter Operations ──────────────────────────────────

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.load(keys::DEAD_LETTERS).await
    }

    /// Move a queued entry into the dead-letter collection.
    ///
    /// The dead letter is written before the queue entry is removed: a crash
    /// in between leaves the entry in both places rather than in neither.
    /// Returns false if the entry was no longer queued.
    pub async fn add_dead_letter(&self, id: &str, attempts: u32, last_error: String) -> Result<bool> {
        let mut revision = self.revision.lock().await;

        let mut entries: Vec<QueueEntry> = self.load(keys::QUEUE).await?;
        let Some(pos) = entries.iter().position(|e| e.id() == id) else {
            return Ok(false);
        };
        let entry = entries.remove(pos);

        let mut letters: Vec<DeadLetter> = self.load(keys::DEAD_LETTERS).await?;
        letters.push(DeadLetter {
            entry,
            attempts,
            last_error,
            dead_lettered_at: crate::time_utils::now(),
        });
        self.persist(keys::DEAD_LETTERS, &letters).await?;
        self.persist(keys::QUEUE, &entries).await?;
        *revision += 1;
        Ok(true)
    }

    pub async fn clear_dead_letters(&self) -> Result<()> {
        let mut revision = self.revision.lock().await;
        self.kv.remove(keys::DEAD_LETTERS).await?;
        *revision += 1;
        Ok(())
    }

    // ─── Derived Counts ──────────────────────────────────────────

    /// Counts from one consistent view of the store.
    ///
    /// Taken under the write lock, so no mutation lands between reading the
    /// queue and reading the dead letters.
    pub async fn counts(&self) -> Result<QueueCounts> {
        let revision = self.revision.lock().await;

        let entries: Vec<QueueEntry> = self.load(keys::QUEUE).await?;
        let letters: Vec<DeadLetter> = self.load(keys::DEAD_LETTERS).await?;
        let pending = entries
            .iter()
            .filter(|e| e.kind() == EntryKind::Action)
            .count();
        Ok(QueueCounts {
            pending,
            calls: entries.len() - pending,
            dead_letters: letters.len(),
            revision: *revision,
        })
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn persist<T: Serialize>(&self, key: &str, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return self.kv.remove(key).await;
        }
        self.kv.set(key, serde_json::to_string(records)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryKv;
    use crate::models::{ActionType, HttpMethod, OfflineQueueItem, PendingAction};
    use serde_json::json;

    fn store() -> QueueStore {
        QueueStore::new(Arc::new(MemoryKv::new()))
    }

    fn action(t: ActionType, subject: &str) -> QueueEntry {
        PendingAction::new(t, subject, serde_json::Value::Null).into()
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = store();
        let a = action(ActionType::Accept, "B1");
        let b = action(ActionType::Complete, "B1");
        let c = action(ActionType::Cancel, "B2");

        for e in [&a, &b, &c] {
            store.add(e.clone()).await.unwrap();
        }

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
    }

    #[tokio::test]
    async fn test_add_ignores_duplicate_ids() {
        let store = store();
        let a = action(ActionType::Accept, "B1");
        store.add(a.clone()).await.unwrap();
        store.add(a).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_reports_missing() {
        let store = store();
        let a = action(ActionType::Reject, "B3");
        store.add(a.clone()).await.unwrap();

        assert!(store.remove(a.id()).await.unwrap());
        assert!(!store.remove(a.id()).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_split_by_kind() {
        let store = store();
        store.add(action(ActionType::Accept, "B1")).await.unwrap();
        store
            .add(OfflineQueueItem::new("rate", HttpMethod::Post, "/ratings", json!({})).into())
            .await
            .unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.calls, 1);
        assert_eq!(counts.dead_letters, 0);
    }

    #[tokio::test]
    async fn test_counts_revision_tracks_mutations() {
        let store = store();
        let before = store.counts().await.unwrap().revision;

        let a = action(ActionType::Accept, "B1");
        store.add(a.clone()).await.unwrap();
        let added = store.counts().await.unwrap();
        assert!(added.revision > before);

        // Duplicates and metadata changes leave the queue as it was.
        store.add(a.clone()).await.unwrap();
        store.set_metadata(|m| m.last_sync_at = None).await.unwrap();
        assert_eq!(store.counts().await.unwrap(), added);

        store.remove(a.id()).await.unwrap();
        let removed = store.counts().await.unwrap();
        assert!(removed.revision > added.revision);
        assert_eq!(removed.pending, 0);
    }

    #[tokio::test]
    async fn test_metadata_patch() {
        let store = store();
        assert_eq!(store.metadata().await.unwrap(), SyncMetadata::default());

        let now = crate::time_utils::now();
        store
            .set_metadata(|m| {
                m.last_sync_at = Some(now);
                m.attempts.insert("x".to_string(), 2);
            })
            .await
            .unwrap();

        let metadata = store.metadata().await.unwrap();
        assert_eq!(metadata.last_sync_at, Some(now));
        assert_eq!(metadata.attempts.get("x"), Some(&2));
    }

    #[tokio::test]
    async fn test_dead_letter_moves_entry() {
        let store = store();
        let a = action(ActionType::Complete, "B9");
        store.add(a.clone()).await.unwrap();

        assert!(store
            .add_dead_letter(a.id(), 3, "HTTP 409".to_string())
            .await
            .unwrap());
        assert!(store.list().await.unwrap().is_empty());

        let letters = store.dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].entry, a);
        assert_eq!(letters[0].attempts, 3);

        assert!(!store.add_dead_letter(a.id(), 3, String::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let store = Arc::new(store());
        let mut handles = vec![];
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add(action(ActionType::Accept, &format!("B{}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 20);
    }
}
