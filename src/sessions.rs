// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser-session registry.
//!
//! Each signed-in browser gets its own session tracker and resolver, found
//! again through an opaque key stored in a cookie. A browser holds at most
//! one entry: signing in again retires the previous one.

use crate::config::{GUARD_CHECK_TIMEOUT, SESSION_IDLE_TIMEOUT};
use crate::models::AuthorizationState;
use crate::services::{AdminPolicy, AuthResolver, ResolverOptions, SessionTracker};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Tracker and resolver belonging to one browser.
#[derive(Clone)]
pub struct BrowserSession {
    pub tracker: Arc<SessionTracker>,
    pub resolver: Arc<AuthResolver>,
}

impl BrowserSession {
    /// Settled authorization state, or the in-progress one if the resolver
    /// is still loading after the guard check window.
    pub async fn settled(&self) -> AuthorizationState {
        match tokio::time::timeout(GUARD_CHECK_TIMEOUT, self.resolver.resolved()).await {
            Ok(state) => state,
            Err(_) => self.resolver.current(),
        }
    }
}

struct Entry {
    browser: BrowserSession,
    last_seen: Instant,
}

pub struct SessionRegistry {
    entries: DashMap<String, Entry>,
    policy: Arc<AdminPolicy>,
    options: ResolverOptions,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(policy: Arc<AdminPolicy>, options: ResolverOptions) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            options,
            idle_timeout: SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn policy(&self) -> &Arc<AdminPolicy> {
        &self.policy
    }

    /// Start resolving for a signed-in tracker; returns the cookie key.
    ///
    /// `previous` is the key the browser already carried, if any. That entry
    /// is retired first, and its key is kept when the same user signed in
    /// again. Any other sign-in gets a fresh key.
    pub async fn register(
        &self,
        previous: Option<&str>,
        tracker: Arc<SessionTracker>,
    ) -> (String, BrowserSession) {
        let mut reused = None;
        if let Some(previous) = previous {
            let next_user = tracker
                .get_current_session()
                .await
                .ok()
                .flatten()
                .map(|s| s.user_id().to_string());
            if self.retire(previous, next_user.as_deref()).await {
                reused = Some(previous.to_string());
            }
        }
        self.prune();

        let resolver = Arc::new(AuthResolver::spawn(
            Some(tracker.clone()),
            self.policy.clone(),
            self.options.clone(),
        ));
        let browser = BrowserSession { tracker, resolver };

        let key = reused.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.entries.insert(
            key.clone(),
            Entry {
                browser: browser.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(active = self.entries.len(), "Browser session started");
        (key, browser)
    }

    /// Look up a browser session and mark it as recently used.
    pub fn get(&self, key: &str) -> Option<BrowserSession> {
        let mut entry = self.entries.get_mut(key)?;
        entry.last_seen = Instant::now();
        Some(entry.browser.clone())
    }

    /// Sign out and forget the browser session. Returns whether it existed.
    pub async fn end(&self, key: &str) -> bool {
        let Some((_, entry)) = self.entries.remove(key) else {
            return false;
        };
        entry.browser.tracker.sign_out().await;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove the entry under `key` ahead of a new sign-in by `next_user`.
    ///
    /// A different user is signed out remotely. The same user is only
    /// forgotten locally, since a remote sign-out would revoke the session
    /// just issued. Returns whether the key belonged to `next_user`.
    async fn retire(&self, key: &str, next_user: Option<&str>) -> bool {
        let Some((_, entry)) = self.entries.remove(key) else {
            return false;
        };
        let previous_user = entry.browser.resolver.current().user_id().map(str::to_string);
        let same_user = previous_user.is_some() && previous_user.as_deref() == next_user;
        if same_user || previous_user.is_none() {
            entry.browser.tracker.clear_local().await;
        } else {
            entry.browser.tracker.sign_out().await;
        }
        tracing::debug!(
            user_id = previous_user.as_deref().unwrap_or("<none>"),
            same_user,
            "Browser session replaced"
        );
        same_user
    }

    /// Drop entries whose resolver settled without a session (forced
    /// sign-out) and entries idle past the timeout.
    fn prune(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if now.duration_since(entry.last_seen) > self.idle_timeout {
                return false;
            }
            let state = entry.browser.resolver.current();
            state.loading || state.session.is_some()
        });
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Pruned browser sessions");
        }
    }
}
