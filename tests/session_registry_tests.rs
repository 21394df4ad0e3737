// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser-session registry lifetime.

use role_hub::backend::Backend;
use role_hub::models::SessionUser;
use role_hub::services::{AdminPolicy, ResolverOptions, SessionTracker};
use role_hub::sessions::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{profile, FakeBackend};

fn registry(idle: Duration) -> SessionRegistry {
    let policy = Arc::new(AdminPolicy::new(
        Vec::<String>::new(),
        Vec::<String>::new(),
        "email.com",
    ));
    SessionRegistry::new(policy, ResolverOptions::default()).with_idle_timeout(idle)
}

async fn signed_in(fake: &Arc<FakeBackend>, id: &str) -> Arc<SessionTracker> {
    let tracker = Arc::new(SessionTracker::new(fake.clone() as Arc<dyn Backend>));
    let user = SessionUser {
        id: id.to_string(),
        email: Some(format!("{}@example.com", id)),
    };
    tracker.adopt(fake.issue_session(user, 3600)).await;
    tracker
}

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_are_evicted() {
    let fake = FakeBackend::new();
    for id in ["u1", "u2", "u3"] {
        fake.set_profile(profile(id, "", true, false));
    }
    let sessions = registry(Duration::from_secs(60));

    let (first, browser) = sessions.register(None, signed_in(&fake, "u1").await).await;
    browser.settled().await;
    drop(browser);

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(sessions.get(&first).is_some());

    tokio::time::sleep(Duration::from_secs(45)).await;
    let (second, browser) = sessions.register(None, signed_in(&fake, "u2").await).await;
    browser.settled().await;
    drop(browser);
    // Touched 45s ago: still live.
    assert_eq!(sessions.len(), 2);

    tokio::time::sleep(Duration::from_secs(61)).await;
    let (third, _browser) = sessions.register(None, signed_in(&fake, "u3").await).await;

    assert_eq!(sessions.len(), 1);
    assert!(sessions.get(&first).is_none());
    assert!(sessions.get(&second).is_none());
    assert!(sessions.get(&third).is_some());
    fake.wait_for_feeds_closed("u1").await;
    fake.wait_for_feeds_closed("u2").await;
}

#[tokio::test]
async fn test_unknown_previous_key_gets_fresh_key() {
    let fake = FakeBackend::new();
    fake.set_profile(profile("u1", "", true, false));
    let sessions = registry(Duration::from_secs(60));

    let (key, _browser) = sessions
        .register(Some("stale"), signed_in(&fake, "u1").await)
        .await;

    assert_ne!(key, "stale");
    assert_eq!(sessions.len(), 1);
}
