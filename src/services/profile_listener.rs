// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime listener for the current user's profile row.

use super::resolver::{ProfileChange, ProfileMessage};
use crate::backend::Backend;
use crate::models::Session;
use crate::task::TaskGuard;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Subscribe to update notifications for the session's profile and forward
/// each one as a partial merge. Dropping the guard closes the subscription.
pub fn spawn(
    backend: Arc<dyn Backend>,
    session: Session,
    generation: u64,
    updates: mpsc::Sender<ProfileMessage>,
) -> TaskGuard {
    TaskGuard::spawn(async move {
        let user_id = session.user_id().to_string();
        let mut feed = match backend
            .subscribe_profile(&session.access_token, &user_id)
            .await
        {
            Ok(feed) => feed,
            Err(e) => {
                // The approval poller still covers unapproved users.
                tracing::warn!(user_id = %user_id, error = %e, "Realtime subscription failed");
                return;
            }
        };
        tracing::debug!(user_id = %user_id, generation, "Profile listener subscribed");

        while let Some(patch) = feed.next().await {
            let message = ProfileMessage {
                generation,
                change: Ok(ProfileChange::Patch(patch)),
            };
            if updates.send(message).await.is_err() {
                break;
            }
        }
        tracing::debug!(user_id = %user_id, generation, "Profile listener finished");
    })
}
