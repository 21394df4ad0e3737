// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local mirror of one user's backend session.
//!
//! The backend decides every transition (sign-in, refresh, sign-out); the
//! tracker records the result and broadcasts it to listeners.

use crate::backend::Backend;
use crate::error::AppError;
use crate::models::{Session, SessionEvent};
use crate::time_utils::now_unix;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const EVENT_BUFFER: usize = 16;

/// Lifecycle of the mirrored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Authenticated(Session),
    Anonymous,
}

impl SessionPhase {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionPhase::Uninitialized | SessionPhase::Loading)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionPhase::Authenticated(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Option<Session>> for SessionPhase {
    fn from(session: Option<Session>) -> Self {
        session.map_or(SessionPhase::Anonymous, SessionPhase::Authenticated)
    }
}

/// Session tracker for one browser session.
pub struct SessionTracker {
    backend: Arc<dyn Backend>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionTracker {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            backend,
            current: RwLock::new(None),
            events,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Register for session transitions. Dropping the receiver unregisters.
    pub fn on_session_change(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current session, refreshing it first when the access token expired.
    ///
    /// A failed refresh (revoked or unknown refresh token) is an
    /// `InvalidSession` error; the stale session is left in place for the
    /// caller to clear.
    pub async fn get_current_session(&self) -> Result<Option<Session>, AppError> {
        let session = match self.current.read().await.clone() {
            Some(s) => s,
            None => return Ok(None),
        };
        if !session.is_expired(now_unix()) {
            return Ok(Some(session));
        }

        tracing::debug!(user_id = %session.user_id(), "Access token expired, refreshing");
        let refreshed = self
            .backend
            .refresh_session(&session.refresh_token)
            .await
            .map_err(|e| match e {
                AppError::Timeout(_) | AppError::Backend(_) => e,
                other => AppError::InvalidSession(other.to_string()),
            })?;

        *self.current.write().await = Some(refreshed.clone());
        self.emit(SessionEvent::TokenRefreshed(refreshed.clone()));
        Ok(Some(refreshed))
    }

    /// Password sign-in; mirrors the backend's session on success.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        self.adopt(session.clone()).await;
        Ok(session)
    }

    /// Record a session the backend issued elsewhere (sign-up, OAuth).
    pub async fn adopt(&self, session: Session) {
        tracing::info!(user_id = %session.user_id(), "Session established");
        *self.current.write().await = Some(session.clone());
        self.emit(SessionEvent::SignedIn(session));
    }

    /// Sign out remotely (best effort) and locally (always).
    pub async fn sign_out(&self) {
        let previous = self.current.write().await.take();
        if let Some(session) = previous {
            if let Err(e) = self.backend.sign_out(&session.access_token).await {
                tracing::warn!(
                    user_id = %session.user_id(),
                    error = %e,
                    "Remote sign-out failed; local session cleared anyway"
                );
            }
        }
        self.emit(SessionEvent::SignedOut);
    }

    /// Forget cached credentials without notifying listeners.
    pub async fn clear_local(&self) -> Option<Session> {
        self.current.write().await.take()
    }

    fn emit(&self, event: SessionEvent) {
        tracing::debug!(event = event.name(), "Session transition");
        // No listeners is fine.
        let _ = self.events.send(event);
    }
}
