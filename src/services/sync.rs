// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync coordinator: drains the durable queue through the gateway.
//!
//! A pass runs in two phases, both strictly sequential and in insertion
//! order:
//! 1. Domain actions (later actions may depend on earlier ones landing)
//! 2. Generic deferred calls, skipping tags that shadow a domain action
//!
//! Failed entries stay queued for the next trigger. A session expiry
//! aborts the pass since every remaining call would fail the same way.

use crate::db::QueueStore;
use crate::error::{Result, SyncError};
use crate::models::{EntryKind, OfflineQueueItem, PendingAction, QueueEntry, SyncStatus};
use crate::services::gateway::AuthenticatedGateway;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Result of a `request_sync` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another pass was already draining; this call did nothing.
    AlreadyRunning,
    /// No authenticated session; no calls were attempted.
    NoSession,
    Completed(SyncReport),
    /// The session ended mid-pass. Remaining entries are untouched.
    SessionExpired(SyncReport),
}

/// Per-pass tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub synced: usize,
    pub failed: usize,
    /// Deferred calls passed over because they shadow a domain action
    pub skipped: usize,
    pub dead_lettered: usize,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            synced: 0,
            failed: 0,
            skipped: 0,
            dead_lettered: 0,
        }
    }
}

/// Whether the pass continues after settling an entry.
enum Flow {
    Continue,
    Abort,
}

/// Clears `is_syncing` however the drain future ends.
struct SyncingFlag<'a>(&'a watch::Sender<SyncStatus>);

impl<'a> SyncingFlag<'a> {
    fn raise(status: &'a watch::Sender<SyncStatus>) -> Self {
        status.send_modify(|s| s.is_syncing = true);
        Self(status)
    }
}

impl Drop for SyncingFlag<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.is_syncing = false);
    }
}

pub struct SyncCoordinator {
    store: Arc<QueueStore>,
    gateway: AuthenticatedGateway,
    /// Held for the duration of a drain; `try_lock` failure means busy.
    drain_lock: Mutex<()>,
    status: watch::Sender<SyncStatus>,
    /// Store revision of the counts last published
    published_revision: AtomicU64,
    max_attempts: Option<u32>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<QueueStore>,
        gateway: AuthenticatedGateway,
        max_attempts: Option<u32>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            store,
            gateway,
            drain_lock: Mutex::new(()),
            status,
            published_revision: AtomicU64::new(0),
            max_attempts,
        }
    }

    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    pub fn gateway(&self) -> &AuthenticatedGateway {
        &self.gateway
    }

    // ─── UI Surface ──────────────────────────────────────────────

    /// Live status; receivers see every counter change.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Current status snapshot.
    pub fn current_status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Record a user action for later delivery.
    pub async fn enqueue(&self, action: PendingAction) -> Result<()> {
        tracing::info!(
            item_id = action.id(),
            action = %action.action_type(),
            subject_id = action.subject_id(),
            "Queued action"
        );
        self.store.add(action.into()).await?;
        self.publish_counts().await
    }

    /// Record a generic deferred call for later delivery.
    pub async fn enqueue_call(&self, item: OfflineQueueItem) -> Result<()> {
        tracing::info!(
            item_id = %item.id,
            action = %item.action,
            endpoint = %item.endpoint,
            "Queued call"
        );
        self.store.add(item.into()).await?;
        self.publish_counts().await
    }

    /// Drop all queued state, metadata and dead letters (used on logout).
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear().await?;
        self.store.clear_metadata().await?;
        self.store.clear_dead_letters().await?;
        tracing::info!("Cleared sync queue");
        self.refresh_status().await
    }

    pub fn set_online(&self, online: bool) {
        self.status.send_if_modified(|s| {
            let changed = s.is_online != online;
            s.is_online = online;
            changed
        });
    }

    /// Reload every counter from storage.
    pub async fn refresh_status(&self) -> Result<()> {
        let metadata = self.store.metadata().await?;
        self.publish_counts().await?;
        self.status
            .send_modify(|s| s.last_sync_at = metadata.last_sync_at);
        Ok(())
    }

    // ─── Drain ───────────────────────────────────────────────────

    /// Drain the queue unless a drain is already running.
    ///
    /// Remote failures of individual entries never surface here; storage
    /// failures do.
    pub async fn request_sync(&self) -> Result<SyncOutcome> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("Sync already running, ignoring request");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        if !self.gateway.refresher().has_session() {
            tracing::debug!("No session, skipping sync");
            return Ok(SyncOutcome::NoSession);
        }

        let _syncing = SyncingFlag::raise(&self.status);
        self.drain().await
    }

    async fn drain(&self) -> Result<SyncOutcome> {
        let started_at = crate::time_utils::now();
        let mut report = SyncReport::new(started_at);
        let mut attempted = HashSet::new();

        tracing::info!(
            started_at = %crate::time_utils::format_utc_rfc3339(started_at),
            "Sync pass started"
        );

        while let Some(entry) = self.next_entry(EntryKind::Action, &mut attempted).await? {
            let QueueEntry::Action(action) = &entry else {
                continue;
            };
            let result = self.gateway.dispatch_action(action).await;
            if let Flow::Abort = self.settle(&entry, result, &mut report).await? {
                return Ok(SyncOutcome::SessionExpired(report));
            }
        }

        while let Some(entry) = self.next_entry(EntryKind::Call, &mut attempted).await? {
            let QueueEntry::Call(item) = &entry else {
                continue;
            };
            if let Some(shadowed) = item.shadowed_action_type() {
                tracing::debug!(
                    item_id = %item.id,
                    action = %shadowed,
                    "Call shadows a domain action, leaving it in place"
                );
                report.skipped += 1;
                continue;
            }
            let result = self.gateway.dispatch_call(item).await;
            if let Flow::Abort = self.settle(&entry, result, &mut report).await? {
                return Ok(SyncOutcome::SessionExpired(report));
            }
        }

        let finished_at = crate::time_utils::now();
        self.store
            .set_metadata(|m| m.last_sync_at = Some(finished_at))
            .await?;
        self.status
            .send_modify(|s| s.last_sync_at = Some(finished_at));

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            dead_lettered = report.dead_lettered,
            "Sync pass complete"
        );
        Ok(SyncOutcome::Completed(report))
    }

    /// Oldest entry of `kind` not yet attempted in this pass.
    ///
    /// The store is re-read each time, so entries enqueued mid-pass are
    /// picked up and entries cleared mid-pass are not sent.
    async fn next_entry(
        &self,
        kind: EntryKind,
        attempted: &mut HashSet<String>,
    ) -> Result<Option<QueueEntry>> {
        let next = self
            .store
            .list()
            .await?
            .into_iter()
            .find(|e| e.kind() == kind && !attempted.contains(e.id()));
        if let Some(entry) = &next {
            attempted.insert(entry.id().to_string());
        }
        Ok(next)
    }

    async fn settle(
        &self,
        entry: &QueueEntry,
        result: Result<Value>,
        report: &mut SyncReport,
    ) -> Result<Flow> {
        match result {
            Ok(_) => {
                self.store.remove(entry.id()).await?;
                if self.max_attempts.is_some() {
                    self.forget_attempts(entry.id()).await?;
                }
                report.synced += 1;
                self.publish_counts().await?;
                tracing::info!(item_id = entry.id(), action = entry.label(), "Entry synced");
                Ok(Flow::Continue)
            }
            Err(SyncError::SessionExpired) => {
                tracing::warn!(
                    item_id = entry.id(),
                    "Session expired during sync, aborting pass"
                );
                Ok(Flow::Abort)
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    item_id = entry.id(),
                    action = entry.label(),
                    error = %e,
                    transient = e.is_transient(),
                    "Entry failed, keeping it queued"
                );
                if let Some(max) = self.max_attempts {
                    if self.record_failure(entry, &e, max).await? {
                        report.dead_lettered += 1;
                    }
                }
                Ok(Flow::Continue)
            }
        }
    }

    /// Count a failed attempt; dead-letter the entry once it reaches `max`.
    /// Returns true if the entry was dead-lettered.
    async fn record_failure(&self, entry: &QueueEntry, error: &SyncError, max: u32) -> Result<bool> {
        let id = entry.id().to_string();
        let metadata = self
            .store
            .set_metadata(|m| *m.attempts.entry(id.clone()).or_insert(0) += 1)
            .await?;
        let attempts = metadata.attempts.get(&id).copied().unwrap_or(0);
        if attempts < max {
            return Ok(false);
        }

        let moved = self
            .store
            .add_dead_letter(&id, attempts, error.to_string())
            .await?;
        self.forget_attempts(&id).await?;
        if moved {
            tracing::error!(
                item_id = %id,
                action = entry.label(),
                attempts,
                "Entry exhausted its retries, dead-lettered"
            );
            self.publish_counts().await?;
        }
        Ok(moved)
    }

    async fn forget_attempts(&self, id: &str) -> Result<()> {
        self.store
            .set_metadata(|m| {
                m.attempts.remove(id);
            })
            .await?;
        Ok(())
    }

    /// Publish the store's counts unless newer ones were published first.
    async fn publish_counts(&self) -> Result<()> {
        let counts = self.store.counts().await?;
        // The closure runs under the channel's lock, which orders the
        // revision check against other publishers.
        self.status.send_if_modified(|s| {
            if counts.revision < self.published_revision.load(Ordering::SeqCst) {
                tracing::trace!(revision = counts.revision, "Dropping stale counts");
                return false;
            }
            self.published_revision
                .store(counts.revision, Ordering::SeqCst);
            let changed = s.pending_count != counts.pending
                || s.queue_count != counts.calls
                || s.dead_letter_count != counts.dead_letters;
            s.pending_count = counts.pending;
            s.queue_count = counts.calls;
            s.dead_letter_count = counts.dead_letters;
            changed
        });
        Ok(())
    }
}
