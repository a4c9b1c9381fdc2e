// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted credential set with an in-memory copy.
//!
//! Only the gateway and the refresh coordinator write through this type.

use crate::db::keys;
use crate::db::kv::KvStore;
use crate::error::Result;
use crate::models::CredentialSet;
use std::sync::{Arc, PoisonError, RwLock};

pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
    current: RwLock<Option<CredentialSet>>,
}

impl CredentialStore {
    /// Load whatever credentials were persisted by a previous run.
    pub async fn load(kv: Arc<dyn KvStore>) -> Result<Self> {
        let current = kv
            .get(keys::CREDENTIALS)
            .await?
            .map(|raw| serde_json::from_str::<CredentialSet>(&raw))
            .transpose()?;

        if current.is_some() {
            tracing::debug!("Restored persisted session");
        }

        Ok(Self {
            kv,
            current: RwLock::new(current),
        })
    }

    pub fn current(&self) -> Option<CredentialSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    pub fn has_session(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Persist new credentials, then publish them in memory.
    pub async fn save(&self, credentials: CredentialSet) -> Result<()> {
        self.kv
            .set(keys::CREDENTIALS, serde_json::to_string(&credentials)?)
            .await?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
        Ok(())
    }

    /// Forget the session.
    ///
    /// The in-memory copy is dropped first so no new request picks up the
    /// old token while the substrate write is in flight.
    pub async fn clear(&self) -> Result<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.kv.remove(keys::CREDENTIALS).await
    }
}
