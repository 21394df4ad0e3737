// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile point-reads.
//!
//! The loader only reports what happened. Deciding that a failed read means
//! the session is dead (and acting on it) is the resolver's job.

use crate::backend::Backend;
use crate::error::AppError;
use crate::models::{Profile, Session};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProfileLoader {
    backend: Arc<dyn Backend>,
}

impl ProfileLoader {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Fetch the profile row of the session's user; `None` if it does not exist yet.
    pub async fn load(&self, session: &Session) -> Result<Option<Profile>, AppError> {
        let profile = self
            .backend
            .fetch_profile(&session.access_token, session.user_id())
            .await?;

        tracing::debug!(
            user_id = %session.user_id(),
            found = profile.is_some(),
            approved = profile.as_ref().map(|p| p.is_approved),
            "Profile loaded"
        );
        Ok(profile)
    }
}
