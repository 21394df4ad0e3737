// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session tracker transitions and refresh behavior.

use role_hub::backend::Backend;
use role_hub::error::AppError;
use role_hub::models::{SessionEvent, SessionUser};
use role_hub::services::SessionTracker;
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod common;
use common::FakeBackend;

fn user() -> SessionUser {
    SessionUser {
        id: "u1".to_string(),
        email: Some("11999990000@email.com".to_string()),
    }
}

fn tracker(fake: &Arc<FakeBackend>) -> SessionTracker {
    SessionTracker::new(fake.clone() as Arc<dyn Backend>)
}

#[tokio::test]
async fn test_sign_in_emits_signed_in() {
    let fake = FakeBackend::new();
    fake.add_account("11999990000@email.com", "secret1", "u1");
    let tracker = tracker(&fake);
    let mut events = tracker.on_session_change();

    let session = tracker
        .sign_in_with_password("11999990000@email.com", "secret1")
        .await
        .unwrap();
    assert_eq!(session.user_id(), "u1");

    match events.recv().await.unwrap() {
        SessionEvent::SignedIn(s) => assert_eq!(s.user_id(), "u1"),
        other => panic!("unexpected event: {}", other.name()),
    }
    assert_eq!(tracker.get_current_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_rejected_credentials_surface_backend_message() {
    let fake = FakeBackend::new();
    fake.add_account("11999990000@email.com", "secret1", "u1");
    let tracker = tracker(&fake);

    let err = tracker
        .sign_in_with_password("11999990000@email.com", "wrong")
        .await
        .unwrap_err();
    match err {
        AppError::BackendRejected(msg) => assert_eq!(msg, "Invalid login credentials"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(tracker.get_current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_session_is_refreshed() {
    let fake = FakeBackend::new();
    let tracker = tracker(&fake);
    let stale = fake.issue_session(user(), -10);
    tracker.adopt(stale.clone()).await;
    let mut events = tracker.on_session_change();

    let current = tracker.get_current_session().await.unwrap().unwrap();
    assert_ne!(current.access_token, stale.access_token);
    assert_eq!(current.user_id(), "u1");

    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::TokenRefreshed(_)
    ));
}

#[tokio::test]
async fn test_failed_refresh_is_invalid_session() {
    let fake = FakeBackend::new();
    fake.fail_refresh.store(true, Ordering::SeqCst);
    let tracker = tracker(&fake);
    tracker.adopt(fake.issue_session(user(), -10)).await;

    let err = tracker.get_current_session().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidSession(_)));
    assert!(err.is_session_error());
}

#[tokio::test]
async fn test_sign_out_clears_and_notifies() {
    let fake = FakeBackend::new();
    let tracker = tracker(&fake);
    tracker.adopt(fake.issue_session(user(), 3600)).await;
    let mut events = tracker.on_session_change();

    tracker.sign_out().await;

    assert!(matches!(events.recv().await.unwrap(), SessionEvent::SignedOut));
    assert!(tracker.get_current_session().await.unwrap().is_none());
    assert_eq!(fake.remote_sign_outs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clear_local_is_silent() {
    let fake = FakeBackend::new();
    let tracker = tracker(&fake);
    tracker.adopt(fake.issue_session(user(), 3600)).await;
    let mut events = tracker.on_session_change();

    assert!(tracker.clear_local().await.is_some());
    assert!(tracker.get_current_session().await.unwrap().is_none());
    assert!(events.try_recv().is_err());
    assert_eq!(fake.remote_sign_outs.load(Ordering::SeqCst), 0);
}
