// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guarded pages. The guard layer is applied in routes/mod.rs and hands
//! the settled `AuthorizationState` to these handlers.

use crate::models::{AuthorizationState, Level, Permissions};
use crate::AppState;
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Pages for approved members (level 2 and above).
pub fn member_routes() -> Router<Arc<AppState>> {
    Router::new().route("/members", get(members_page))
}

/// Pages for administrators only.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin", get(admin_page))
}

#[derive(Serialize)]
pub struct PageResponse {
    pub page: &'static str,
    pub user_id: Option<String>,
    pub level: Level,
    pub permissions: Permissions,
}

impl PageResponse {
    fn new(page: &'static str, state: &AuthorizationState) -> Self {
        Self {
            page,
            user_id: state.user_id().map(str::to_string),
            level: state.level,
            permissions: state.permissions,
        }
    }
}

async fn members_page(Extension(state): Extension<AuthorizationState>) -> Json<PageResponse> {
    Json(PageResponse::new("members", &state))
}

async fn admin_page(Extension(state): Extension<AuthorizationState>) -> Json<PageResponse> {
    tracing::debug!(user_id = ?state.user_id(), "Admin page served");
    Json(PageResponse::new("admin", &state))
}
