// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route guard: block protected routes until the resolver reports a
//! sufficient role level.

use crate::config::{AUTH_ENTRY_PATH, GUARD_CHECK_TIMEOUT, SESSION_COOKIE};
use crate::models::{AuthorizationState, BackendStatus, Level};
use crate::sessions::BrowserSession;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Resolver still loading; show a neutral placeholder.
    Checking,
    Allowed,
    /// Level too low; send the user to the auth entry point.
    Denied { redirect_to: &'static str },
}

pub fn evaluate(state: &AuthorizationState, required: Level) -> GuardDecision {
    if state.loading {
        GuardDecision::Checking
    } else if state.level < required {
        GuardDecision::Denied {
            redirect_to: AUTH_ENTRY_PATH,
        }
    } else {
        GuardDecision::Allowed
    }
}

/// Wait until the resolver has settled, then decide.
pub async fn resolve(
    rx: &mut watch::Receiver<AuthorizationState>,
    required: Level,
) -> GuardDecision {
    let decided = rx
        .wait_for(|state| !state.loading)
        .await
        .map(|state| evaluate(&state, required));
    decided.unwrap_or_else(|_| evaluate(&rx.borrow(), required))
}

/// Wait for the next published change and decide again.
///
/// Returns `None` once the resolver is gone.
pub async fn reevaluate(
    rx: &mut watch::Receiver<AuthorizationState>,
    required: Level,
) -> Option<GuardDecision> {
    rx.changed().await.ok()?;
    let decision = evaluate(&rx.borrow_and_update(), required);
    Some(decision)
}

/// Browser session named by the request's cookie, if still registered.
pub fn lookup(app: &AppState, jar: &CookieJar) -> Option<BrowserSession> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| app.sessions.get(cookie.value()))
}

/// State seen by a browser with no tracked session.
pub fn anonymous_state(app: &AppState) -> AuthorizationState {
    match app.backend_status() {
        BackendStatus::Available => AuthorizationState::guest(),
        BackendStatus::NotConfigured => AuthorizationState::not_configured(),
    }
}

/// Middleware state: the app plus the level a route requires.
#[derive(Clone)]
pub struct GuardState {
    pub app: Arc<AppState>,
    pub min_level: Level,
}

impl GuardState {
    pub fn new(app: Arc<AppState>, min_level: Level) -> Self {
        Self { app, min_level }
    }
}

/// Middleware that requires `min_level`.
///
/// Denied requests get a 303 to the auth entry point, so the guarded page
/// never lands in the browser history. Allowed requests carry the
/// `AuthorizationState` as an extension.
pub async fn require_level(
    State(guard): State<GuardState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let state = match lookup(&guard.app, &jar) {
        Some(browser) => {
            let mut rx = browser.resolver.subscribe();
            let waited =
                tokio::time::timeout(GUARD_CHECK_TIMEOUT, resolve(&mut rx, guard.min_level)).await;
            if waited.is_err() {
                tracing::warn!(path = %request.uri().path(), "Guard check still loading");
                return checking_placeholder();
            }
            let state = rx.borrow().clone();
            state
        }
        None => anonymous_state(&guard.app),
    };

    match evaluate(&state, guard.min_level) {
        GuardDecision::Checking => checking_placeholder(),
        GuardDecision::Denied { redirect_to } => {
            tracing::debug!(
                path = %request.uri().path(),
                level = state.level.as_u8(),
                required = guard.min_level.as_u8(),
                "Guard denied"
            );
            Redirect::to(redirect_to).into_response()
        }
        GuardDecision::Allowed => {
            request.extensions_mut().insert(state);
            next.run(request).await
        }
    }
}

fn checking_placeholder() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, "1")],
        Json(serde_json::json!({ "status": "checking" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(loading: bool, level: Level) -> AuthorizationState {
        AuthorizationState {
            loading,
            level,
            ..AuthorizationState::guest()
        }
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(evaluate(&state(true, Level::Admin), Level::Member), GuardDecision::Checking);
        assert_eq!(evaluate(&state(false, Level::Member), Level::Member), GuardDecision::Allowed);
        assert_eq!(evaluate(&state(false, Level::Admin), Level::Member), GuardDecision::Allowed);
        assert_eq!(
            evaluate(&state(false, Level::Member), Level::Admin),
            GuardDecision::Denied { redirect_to: "/auth" }
        );
    }

    #[tokio::test]
    async fn test_resolve_waits_for_loading() {
        let (tx, mut rx) = watch::channel(state(true, Level::Guest));
        let waiter = tokio::spawn(async move { resolve(&mut rx, Level::Member).await });

        tx.send_replace(state(false, Level::Member));
        assert_eq!(waiter.await.unwrap(), GuardDecision::Allowed);
    }

    #[tokio::test]
    async fn test_reevaluate_on_approval() {
        let (tx, mut rx) = watch::channel(state(false, Level::Guest));
        assert!(matches!(
            resolve(&mut rx, Level::Member).await,
            GuardDecision::Denied { .. }
        ));

        tx.send_replace(state(false, Level::Member));
        assert_eq!(reevaluate(&mut rx, Level::Member).await, Some(GuardDecision::Allowed));

        drop(tx);
        assert_eq!(reevaluate(&mut rx, Level::Member).await, None);
    }
}
