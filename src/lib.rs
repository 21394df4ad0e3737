// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role Hub: session and authorization layer for a social event-planning app.
//!
//! Turns backend sessions and profile rows into a stable authorization state
//! (role level, capability flags, loading indicator) and gates routes on it.

pub mod backend;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod sessions;
pub mod task;
pub mod time_utils;

use backend::Backend;
use config::Config;
use models::BackendStatus;
use services::{AdminPolicy, ResolverOptions};
use sessions::SessionRegistry;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Absent when the backend is not configured
    pub backend: Option<Arc<dyn Backend>>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config, backend: Option<Arc<dyn Backend>>) -> Self {
        let policy = Arc::new(AdminPolicy::from_config(&config));
        let sessions = SessionRegistry::new(policy, ResolverOptions::from_config(&config));
        Self {
            config,
            backend,
            sessions,
        }
    }

    pub fn admin_policy(&self) -> &Arc<AdminPolicy> {
        self.sessions.policy()
    }

    pub fn backend_status(&self) -> BackendStatus {
        if self.backend.is_some() {
            BackendStatus::Available
        } else {
            BackendStatus::NotConfigured
        }
    }
}
