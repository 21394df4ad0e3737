// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes: authorization state, connectivity probe, profile self-edit.

use crate::backend::{self, Backend};
use crate::config::PROBE_TIMEOUT;
use crate::error::{AppError, Result};
use crate::middleware::guard;
use crate::models::{AuthorizationState, Profile, ProfileUpsert, Session};
use crate::services::normalize_phone;
use crate::time_utils::with_deadline;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap},
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// API routes. Handlers needing a session find it through the cookie.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/probe", get(probe))
        .route("/api/profile", put(update_profile))
        .route("/api/profile/avatar", put(upload_avatar))
}

/// Backend handle plus the caller's live session (refreshed if expired).
async fn require_session(state: &AppState, jar: &CookieJar) -> Result<(Arc<dyn Backend>, Session)> {
    let backend = backend::require(&state.backend)?.clone();
    let browser = guard::lookup(state, jar).ok_or(AppError::Unauthorized)?;
    let session = browser
        .tracker
        .get_current_session()
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok((backend, session))
}

// ─── Authorization State ─────────────────────────────────────

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub state: AuthorizationState,
    /// Set after a forced sign-out; the client should navigate there.
    #[serde(rename = "redirectTo", skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// Current authorization state; guest when the browser has no session.
async fn get_me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<MeResponse> {
    let Some(browser) = guard::lookup(&state, &jar) else {
        return Json(MeResponse {
            state: guard::anonymous_state(&state),
            redirect_to: None,
        });
    };

    let resolved = browser.settled().await;
    let redirect_to = if resolved.session.is_none() {
        browser.resolver.pending_redirect()
    } else {
        None
    };
    Json(MeResponse {
        state: resolved,
        redirect_to,
    })
}

// ─── Connectivity ────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
}

/// Check that the backend answers within the probe deadline.
async fn probe(State(state): State<Arc<AppState>>) -> Result<Json<ProbeResponse>> {
    let backend = backend::require(&state.backend)?;
    with_deadline("probe", PROBE_TIMEOUT, backend.probe()).await?;
    Ok(Json(ProbeResponse { status: "ok" }))
}

// ─── Profile Self-edit ───────────────────────────────────────

/// Editable profile columns; absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileEdit {
    #[validate(length(min = 1, max = 120, message = "full name must have 1 to 120 characters"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 60, message = "instagram handle is too long"))]
    pub instagram: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl ProfileEdit {
    fn into_upsert(self, session: &Session) -> Result<ProfileUpsert> {
        let phone_number = self.phone.as_deref().map(normalize_phone).transpose()?;
        Ok(ProfileUpsert {
            id: session.user_id().to_string(),
            email: session.email().map(str::to_string),
            phone_number,
            full_name: self.full_name.map(|name| name.trim().to_string()),
            instagram: self
                .instagram
                .map(|handle| handle.trim().trim_start_matches('@').to_string()),
            birthdate: self.birthdate,
            ..Default::default()
        })
    }
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(edit): Json<ProfileEdit>,
) -> Result<Json<Profile>> {
    edit.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let (backend, session) = require_session(&state, &jar).await?;

    let row = edit.into_upsert(&session)?;
    let profile = backend.upsert_profile(&session.access_token, &row).await?;
    tracing::info!(user_id = %session.user_id(), "Profile updated");
    Ok(Json(profile))
}

// ─── Avatar Upload ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct AvatarQuery {
    pub file_name: Option<String>,
}

#[derive(Serialize)]
pub struct AvatarResponse {
    pub avatar_url: String,
}

/// Extension for an image content type, or `None` when not an image.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Store the raw request body as the caller's avatar and record its URL.
async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<AvatarQuery>,
    body: Bytes,
) -> Result<Json<AvatarResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let extension = image_extension(content_type)
        .ok_or_else(|| AppError::Validation("avatar must be an image".into()))?;
    if body.is_empty() {
        return Err(AppError::Validation("empty avatar".into()));
    }
    if body.len() > MAX_AVATAR_BYTES {
        return Err(AppError::Validation("avatar is too large".into()));
    }

    let (backend, session) = require_session(&state, &jar).await?;

    let stem: String = query
        .file_name
        .as_deref()
        .unwrap_or("avatar")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    let stem = if stem.is_empty() { "avatar".to_string() } else { stem };
    let file_name = format!("{}-{}.{}", stem, uuid::Uuid::new_v4().simple(), extension);

    let avatar_url = backend
        .upload_avatar(
            &session.access_token,
            session.user_id(),
            &file_name,
            content_type,
            body.to_vec(),
        )
        .await?;

    let row = ProfileUpsert {
        id: session.user_id().to_string(),
        avatar_url: Some(avatar_url.clone()),
        ..Default::default()
    };
    backend.upsert_profile(&session.access_token, &row).await?;
    tracing::info!(user_id = %session.user_id(), bytes = body.len(), "Avatar uploaded");

    Ok(Json(AvatarResponse { avatar_url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionUser;

    fn session() -> Session {
        Session {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: None,
            user: SessionUser {
                id: "u1".into(),
                email: Some("11999990000@email.com".into()),
            },
        }
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("text/plain"), None);
        assert_eq!(image_extension(""), None);
    }

    #[test]
    fn test_profile_edit_upsert() {
        let edit = ProfileEdit {
            full_name: Some("  Ana Souza ".into()),
            phone: Some("(11) 99999-0000".into()),
            instagram: Some("@ana".into()),
            birthdate: None,
        };
        let row = edit.into_upsert(&session()).unwrap();
        assert_eq!(row.id, "u1");
        assert_eq!(row.full_name.as_deref(), Some("Ana Souza"));
        assert_eq!(row.phone_number.as_deref(), Some("11999990000"));
        assert_eq!(row.instagram.as_deref(), Some("ana"));
        assert_eq!(row.avatar_url, None);
    }

    #[test]
    fn test_profile_edit_rejects_bad_phone() {
        let edit = ProfileEdit {
            full_name: None,
            phone: Some("123".into()),
            instagram: None,
            birthdate: None,
        };
        assert!(matches!(edit.into_upsert(&session()), Err(AppError::Validation(_))));
    }
}
