// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: password sign-in/up, OAuth, sign-out.

use crate::backend;
use crate::config::{SESSION_COOKIE, SIGN_IN_TIMEOUT};
use crate::error::{AppError, Result};
use crate::middleware::guard;
use crate::models::{AuthorizationState, BackendStatus, ProfileUpsert, Session};
use crate::services::{normalize_phone, SessionTracker};
use crate::time_utils::with_deadline;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Create auth routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth", get(auth_entry))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/oauth/{provider}", get(oauth_start))
        .route("/auth/callback", post(oauth_callback))
}

// ─── Cookies ─────────────────────────────────────────────────

fn session_cookie(state: &AppState, key: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, key))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.frontend_url.starts_with("https://"))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Hand a signed-in tracker to the registry and answer with its settled
/// state. Replaces whatever session the browser's cookie pointed at.
async fn start_browser_session(
    state: &AppState,
    jar: CookieJar,
    tracker: Arc<SessionTracker>,
) -> (CookieJar, Json<AuthorizationState>) {
    let previous = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (key, browser) = state.sessions.register(previous.as_deref(), tracker).await;
    let resolved = browser.settled().await;
    (jar.add(session_cookie(state, key)), Json(resolved))
}

// ─── Entry Point ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct AuthEntryResponse {
    pub backend: BackendStatus,
    pub signed_in: bool,
    pub providers: Vec<&'static str>,
}

/// Authentication entry point; where denied guards send the browser.
async fn auth_entry(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<AuthEntryResponse> {
    let signed_in = guard::lookup(&state, &jar)
        .map(|browser| browser.resolver.current().session.is_some())
        .unwrap_or(false);

    Json(AuthEntryResponse {
        backend: state.backend_status(),
        signed_in,
        providers: if state.backend.is_some() {
            vec!["password", "google"]
        } else {
            Vec::new()
        },
    })
}

// ─── Password Sign-in ────────────────────────────────────────

#[derive(Deserialize)]
pub struct SignInRequest {
    /// Email address or phone number
    pub identifier: String,
    pub password: String,
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<(CookieJar, Json<AuthorizationState>)> {
    let backend = backend::require(&state.backend)?.clone();
    if req.password.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    let email = state.admin_policy().alias().login_email(&req.identifier)?;

    let tracker = Arc::new(SessionTracker::new(backend));
    let session = with_deadline(
        "sign-in",
        SIGN_IN_TIMEOUT,
        tracker.sign_in_with_password(&email, &req.password),
    )
    .await?;
    tracing::info!(user_id = %session.user_id(), "Password sign-in");

    Ok(start_browser_session(&state, jar, tracker).await)
}

// ─── Sign-up ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    pub phone: String,
    #[validate(length(min = 6, message = "password must have at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 120, message = "full name must have 1 to 120 characters"))]
    pub full_name: String,
    #[validate(length(max = 60, message = "instagram handle is too long"))]
    pub instagram: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

/// Sign-up awaiting confirmation by the backend.
#[derive(Serialize)]
struct PendingConfirmation {
    status: &'static str,
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignUpRequest>,
) -> Result<Response> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let phone = normalize_phone(&req.phone)?;
    let backend = backend::require(&state.backend)?.clone();

    let email = state.admin_policy().alias().encode(&phone);
    let signed_up = with_deadline(
        "sign-up",
        SIGN_IN_TIMEOUT,
        backend.sign_up(&email, &req.password),
    )
    .await?;
    let Some(session) = signed_up else {
        tracing::info!("Sign-up pending confirmation");
        let body = PendingConfirmation {
            status: "confirmation_required",
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    };

    // Profile rows are created lazily, on the first authenticated action.
    let row = ProfileUpsert {
        id: session.user_id().to_string(),
        email: Some(email),
        phone_number: Some(phone),
        full_name: Some(req.full_name.trim().to_string()),
        instagram: req
            .instagram
            .map(|handle| handle.trim().trim_start_matches('@').to_string())
            .filter(|handle| !handle.is_empty()),
        birthdate: req.birthdate,
        ..Default::default()
    };
    backend.upsert_profile(&session.access_token, &row).await?;
    tracing::info!(user_id = %session.user_id(), "Account created");

    let tracker = Arc::new(SessionTracker::new(backend));
    tracker.adopt(session).await;
    let (jar, body) = start_browser_session(&state, jar, tracker).await;
    Ok((StatusCode::CREATED, jar, body).into_response())
}

// ─── Sign-out ────────────────────────────────────────────────

async fn sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(key) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        if state.sessions.end(&key).await {
            tracing::info!("Browser session signed out");
        }
    }
    (jar.remove(removal_cookie()), StatusCode::NO_CONTENT)
}

// ─── OAuth ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct OAuthStartQuery {
    /// Where the backend should send the browser afterwards.
    pub redirect_to: Option<String>,
}

/// Redirect to the backend's authorize page for `provider`.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthStartQuery>,
) -> Result<Redirect> {
    let backend = backend::require(&state.backend)?;
    if provider.is_empty() || !provider.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation("invalid provider".into()));
    }

    // Only send users back to our own frontend.
    let frontend = state.config.frontend_url.as_str();
    let redirect_to = query
        .redirect_to
        .filter(|target| target.starts_with(frontend))
        .unwrap_or_else(|| format!("{}/auth/callback", frontend));

    tracing::debug!(provider = %provider, "Starting OAuth redirect");
    Ok(Redirect::to(&backend.authorize_url(&provider, &redirect_to)))
}

/// Tokens the frontend read from the OAuth redirect fragment.
#[derive(Deserialize)]
pub struct OAuthCallbackRequest {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<i64>,
}

async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<OAuthCallbackRequest>,
) -> Result<(CookieJar, Json<AuthorizationState>)> {
    let backend = backend::require(&state.backend)?.clone();
    if req.access_token.is_empty() || req.refresh_token.is_empty() {
        return Err(AppError::Validation("missing tokens".into()));
    }

    let user = with_deadline("oauth-callback", SIGN_IN_TIMEOUT, backend.get_user(&req.access_token))
        .await?;
    let session = Session {
        access_token: req.access_token,
        refresh_token: req.refresh_token,
        expires_at: req.expires_at,
        user,
    };
    tracing::info!(user_id = %session.user_id(), "OAuth sign-in completed");

    let tracker = Arc::new(SessionTracker::new(backend));
    tracker.adopt(session).await;
    Ok(start_browser_session(&state, jar, tracker).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up(phone: &str, password: &str, full_name: &str) -> SignUpRequest {
        SignUpRequest {
            phone: phone.into(),
            password: password.into(),
            full_name: full_name.into(),
            instagram: None,
            birthdate: None,
        }
    }

    #[test]
    fn test_sign_up_validation() {
        assert!(sign_up("11999990000", "secret1", "Ana").validate().is_ok());
        assert!(sign_up("11999990000", "short", "Ana").validate().is_err());
        assert!(sign_up("11999990000", "secret1", "").validate().is_err());

        let mut req = sign_up("11999990000", "secret1", "Ana");
        req.instagram = Some("x".repeat(61));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let state = AppState::new(crate::config::Config::test_default(), None);
        let cookie = session_cookie(&state, "abc".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
