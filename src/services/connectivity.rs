// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connectivity observer.
//!
//! Turns a raw boolean "online" signal into transitions and asks the sync
//! coordinator for one drain on every offline→online edge.

use crate::services::api::ApiClient;
use crate::services::sync::SyncCoordinator;
use futures_util::{future, stream, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

/// Collapse a state signal into transitions.
///
/// The state before the first sample is taken to be offline, so a process
/// that starts online emits `Online` straight away and drains whatever a
/// previous run left queued.
pub fn transitions<S>(signal: S) -> impl Stream<Item = Transition>
where
    S: Stream<Item = bool>,
{
    signal
        .scan(false, |last, online| {
            let changed = *last != online;
            *last = online;
            future::ready(Some(changed.then_some(online)))
        })
        .filter_map(|edge| {
            future::ready(edge.map(|online| {
                if online {
                    Transition::Online
                } else {
                    Transition::Offline
                }
            }))
        })
}

/// Adapt a platform channel into a signal stream.
pub fn channel_signal(rx: mpsc::Receiver<bool>) -> impl Stream<Item = bool> + Send {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|online| (online, rx)) })
}

/// Poll `path` every `interval` and report whether it answered.
pub fn probe_signal(
    api: ApiClient,
    path: String,
    interval: Duration,
) -> impl Stream<Item = bool> + Send {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold((api, path, ticker), |(api, path, mut ticker)| async move {
        ticker.tick().await;
        let online = api.probe(&path).await;
        Some((online, (api, path, ticker)))
    })
}

pub struct ConnectivityObserver;

impl ConnectivityObserver {
    /// Watch `signal` until it ends.
    ///
    /// Each `Online` transition while a session exists spawns exactly one
    /// `request_sync`; overlapping requests collapse in the coordinator.
    pub fn spawn<S>(signal: S, coordinator: Arc<SyncCoordinator>) -> JoinHandle<()>
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut events = Box::pin(transitions(signal));

            while let Some(transition) = events.next().await {
                match transition {
                    Transition::Offline => {
                        tracing::info!("Connectivity lost");
                        coordinator.set_online(false);
                    }
                    Transition::Online => {
                        tracing::info!("Connectivity restored");
                        coordinator.set_online(true);

                        if !coordinator.gateway().refresher().has_session() {
                            tracing::debug!("No session, not syncing");
                            continue;
                        }

                        let coordinator = coordinator.clone();
                        tokio::spawn(async move {
                            match coordinator.request_sync().await {
                                Ok(outcome) => tracing::debug!(?outcome, "Sync triggered by reconnect"),
                                Err(e) => tracing::error!(error = %e, "Sync after reconnect failed"),
                            }
                        });
                    }
                }
            }

            tracing::debug!("Connectivity signal closed");
        })
    }
}
