// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - remote calls and coordination.

pub mod api;
pub mod connectivity;
pub mod gateway;
pub mod sync;
pub mod token_refresh;

pub use api::ApiClient;
pub use connectivity::{ConnectivityObserver, Transition};
pub use gateway::AuthenticatedGateway;
pub use sync::{SyncCoordinator, SyncOutcome, SyncReport};
pub use token_refresh::TokenRefreshCoordinator;
