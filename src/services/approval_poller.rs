// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fallback refetch of an unapproved user's profile.
//!
//! Covers realtime notifications that never arrive. Runs only while the
//! resolver keeps the guard; the first fetch happens immediately. Each
//! tick reads the session through the tracker, so an expired access token
//! is refreshed before the fetch.

use super::profile_loader::ProfileLoader;
use super::resolver::{ProfileChange, ProfileMessage};
use super::session_tracker::SessionTracker;
use crate::task::TaskGuard;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

pub fn spawn(
    tracker: Arc<SessionTracker>,
    loader: ProfileLoader,
    interval: Duration,
    generation: u64,
    updates: mpsc::Sender<ProfileMessage>,
) -> TaskGuard {
    TaskGuard::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // First tick completes immediately.
            ticker.tick().await;

            let change = match tracker.get_current_session().await {
                Ok(Some(session)) => match loader.load(&session).await {
                    Ok(Some(profile)) => Ok(ProfileChange::Replace(profile)),
                    Ok(None) => continue,
                    Err(e) => Err(e),
                },
                // Signed out; the resolver hears it from the tracker.
                Ok(None) => break,
                Err(e) => Err(e),
            };

            if let Err(e) = &change {
                tracing::warn!(generation, error = %e, "Approval poll failed");
            }
            let failed = change.is_err();
            if updates.send(ProfileMessage { generation, change }).await.is_err() || failed {
                break;
            }
        }
    })
}
