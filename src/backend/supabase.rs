// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REST client for a Supabase-compatible backend.
//!
//! Handles:
//! - Password sign-in / sign-up, token refresh and sign-out (`/auth/v1`)
//! - Profile point reads and upserts (`/rest/v1`)
//! - Avatar uploads and public URLs (`/storage/v1`)
//! - Opening realtime profile feeds (`/realtime/v1`)

use super::{realtime, tables, Backend, ProfileFeed, AVATAR_BUCKET};
use crate::config::BackendConfig;
use crate::error::AppError;
use crate::models::{Profile, ProfileUpsert, Session, SessionUser};
use crate::time_utils::now_unix;
use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Transport-level ceiling; interactive deadlines are applied by callers.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend client (cheap to clone).
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// Create a client from the configured URL and anonymous key.
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building backend HTTP client")?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Public URL of an object in the avatar bucket.
    pub fn public_avatar_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, AVATAR_BUCKET, path
        )
    }

    /// Websocket endpoint for realtime channels.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base,
            urlencoding::encode(&self.anon_key)
        )
    }

    /// Request builder carrying the API key and a bearer token.
    ///
    /// Without a user token the anonymous key doubles as the bearer.
    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = builder.send().await.map_err(transport_error)?;
        check_response(response).await
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))
    }
}

#[async_trait::async_trait]
impl Backend for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let url = self.auth_endpoint("token?grant_type=password");
        let token: TokenResponse = self
            .send_json(
                self.request(reqwest::Method::POST, &url, None)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        Ok(token.into_session())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let url = self.auth_endpoint("signup");
        let body: Value = self
            .send_json(
                self.request(reqwest::Method::POST, &url, None)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;

        // With email confirmation enabled the backend answers with the bare user.
        if body.get("access_token").is_none() {
            tracing::info!("Sign-up accepted without a session (confirmation pending)");
            return Ok(None);
        }

        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))?;
        Ok(Some(token.into_session()))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        let url = self.auth_endpoint("token?grant_type=refresh_token");
        let token: TokenResponse = self
            .send_json(
                self.request(reqwest::Method::POST, &url, None)
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        Ok(token.into_session())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let url = self.auth_endpoint("logout");
        self.send(self.request(reqwest::Method::POST, &url, Some(access_token)))
            .await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AppError> {
        let url = self.auth_endpoint("user");
        self.send_json(self.request(reqwest::Method::GET, &url, Some(access_token)))
            .await
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.auth_endpoint("authorize"),
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to)
        )
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        let url = self.rest_endpoint(tables::PROFILES);
        let rows: Vec<Profile> = self
            .send_json(
                self.request(reqwest::Method::GET, &url, Some(access_token))
                    .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(
        &self,
        access_token: &str,
        row: &ProfileUpsert,
    ) -> Result<Profile, AppError> {
        let url = self.rest_endpoint(tables::PROFILES);
        let rows: Vec<Profile> = self
            .send_json(
                self.request(reqwest::Method::POST, &url, Some(access_token))
                    .query(&[("on_conflict", "id")])
                    .header("Prefer", "resolution=merge-duplicates,return=representation")
                    .json(row),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Backend("Upsert returned no row".to_string()))
    }

    async fn upload_avatar(
        &self,
        access_token: &str,
        user_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let path = format!(
            "{}/{}",
            urlencoding::encode(user_id),
            urlencoding::encode(file_name)
        );
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, AVATAR_BUCKET, path
        );

        self.send(
            self.request(reqwest::Method::POST, &url, Some(access_token))
                .header(CONTENT_TYPE, content_type)
                .header("x-upsert", "true")
                .body(bytes),
        )
        .await?;

        tracing::info!(user_id, path = %path, "Avatar uploaded");
        Ok(self.public_avatar_url(&path))
    }

    async fn subscribe_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<ProfileFeed, AppError> {
        realtime::subscribe_profile_updates(&self.realtime_url(), access_token, user_id).await
    }

    async fn probe(&self) -> Result<(), AppError> {
        let url = self.auth_endpoint("health");
        self.send(self.request(reqwest::Method::GET, &url, None))
            .await?;
        Ok(())
    }
}

/// Token grant response from the auth API.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now_unix() + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout("backend request")
    } else {
        AppError::Backend(e.to_string())
    }
}

/// Check response status and map failures to the error taxonomy.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = backend_message(&body);

    // Expired or revoked JWT
    if status.as_u16() == 401 {
        return Err(AppError::InvalidSession(message));
    }

    if status.is_client_error() {
        return Err(AppError::BackendRejected(message));
    }

    Err(AppError::Backend(format!("HTTP {}: {}", status, message)))
}

/// Pull the human-readable message out of an auth/rows/storage error body.
fn backend_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
