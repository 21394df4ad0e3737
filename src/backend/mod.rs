// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend-as-a-service access (authentication, rows, realtime, storage).
//!
//! The handle is built once from configuration and passed explicitly to
//! everything that needs it. When configuration is missing there is no
//! handle at all, and callers report "service not configured".

pub mod realtime;
pub mod supabase;

pub use realtime::ProfileFeed;
pub use supabase::SupabaseClient;

use crate::config::BackendConfig;
use crate::error::AppError;
use crate::models::{Profile, ProfileUpsert, Session, SessionUser};
use std::sync::Arc;

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
}

/// Storage bucket holding avatar images, one folder per user.
pub const AVATAR_BUCKET: &str = "avatars";

/// Operations the application needs from the external service.
///
/// Stateless: calls that act on behalf of a user take that user's access
/// token. The session itself is mirrored by the session tracker.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Password sign-in with an email (or phone alias) identity.
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AppError>;

    /// Register; `None` when the backend withholds the session pending confirmation.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError>;

    /// Exchange a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError>;

    /// Revoke the session server-side.
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    /// Resolve the user behind an access token (OAuth completion).
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AppError>;

    /// URL starting the OAuth redirect flow for `provider`.
    fn authorize_url(&self, provider: &str, redirect_to: &str) -> String;

    /// Point read of a profile row by primary key.
    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<Profile>, AppError>;

    /// Insert or update (on primary-key conflict) the caller's profile row.
    async fn upsert_profile(
        &self,
        access_token: &str,
        row: &ProfileUpsert,
    ) -> Result<Profile, AppError>;

    /// Store an avatar under the user's folder; returns its public URL.
    async fn upload_avatar(
        &self,
        access_token: &str,
        user_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AppError>;

    /// Open a realtime feed of update notifications for one profile row.
    async fn subscribe_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<ProfileFeed, AppError>;

    /// Cheap reachability check.
    async fn probe(&self) -> Result<(), AppError>;
}

/// Build the process-wide backend handle, if configured.
pub fn connect(config: Option<&BackendConfig>) -> Result<Option<Arc<dyn Backend>>, AppError> {
    match config {
        Some(cfg) => {
            let client = SupabaseClient::new(cfg)?;
            tracing::info!(url = %cfg.url, "Backend client initialized");
            Ok(Some(Arc::new(client)))
        }
        None => {
            tracing::warn!("Backend not configured; running in degraded mode");
            Ok(None)
        }
    }
}

/// Unwrap the handle or report the degraded state.
pub fn require(backend: &Option<Arc<dyn Backend>>) -> Result<&Arc<dyn Backend>, AppError> {
    backend.as_ref().ok_or(AppError::NotConfigured)
}
