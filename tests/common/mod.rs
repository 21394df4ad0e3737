// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use role_hub::backend::{Backend, ProfileFeed};
use role_hub::config::Config;
use role_hub::error::AppError;
use role_hub::models::{Profile, ProfilePatch, ProfileUpsert, Session, SessionUser};
use role_hub::routes::create_router;
use role_hub::time_utils::now_unix;
use role_hub::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct FakeBackend {
    /// email -> (password, user id)
    accounts: Mutex<HashMap<String, (String, String)>>,
    /// access or refresh token -> user
    tokens: Mutex<HashMap<String, SessionUser>>,
    /// access token -> expires_at
    expiries: Mutex<HashMap<String, i64>>,
    profiles: Mutex<HashMap<String, Profile>>,
    /// (user id, realtime feed)
    feeds: Mutex<Vec<(String, mpsc::Sender<ProfilePatch>)>>,
    issued: AtomicUsize,
    pub fetches: AtomicUsize,
    pub remote_sign_outs: AtomicUsize,
    pub upserts: AtomicUsize,
    pub fail_profile_reads: AtomicBool,
    pub hang_profile_reads: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub reject_expired_tokens: AtomicBool,
    pub require_confirmation: AtomicBool,
    pub sign_up_hangs: AtomicBool,
    pub probe_hangs: AtomicBool,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_account(&self, email: &str, password: &str, user_id: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user_id.to_string()));
    }

    pub fn set_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.lock().unwrap().get(user_id).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Issue a session for `user` as if the backend had signed it in.
    pub fn issue_session(&self, user: SessionUser, expires_in: i64) -> Session {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            access_token: format!("access-{}-{}", user.id, n),
            refresh_token: format!("refresh-{}-{}", user.id, n),
            expires_at: Some(now_unix() + expires_in),
            user,
        };
        if let Some(expires_at) = session.expires_at {
            self.expiries
                .lock()
                .unwrap()
                .insert(session.access_token.clone(), expires_at);
        }
        let mut tokens = self.tokens.lock().unwrap();
        tokens.insert(session.access_token.clone(), session.user.clone());
        tokens.insert(session.refresh_token.clone(), session.user.clone());
        session
    }

    /// Realtime feeds for `user_id` that still have a live receiver.
    pub fn open_feeds(&self, user_id: &str) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, tx)| id == user_id && !tx.is_closed())
            .count()
    }

    /// Wait until `user_id` has no open feed left.
    pub async fn wait_for_feeds_closed(&self, user_id: &str) {
        for _ in 0..200 {
            if self.open_feeds(user_id) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("realtime feed for {} still open", user_id);
    }

    /// Wait until some listener has subscribed to profile updates.
    pub async fn wait_for_subscriber(&self) {
        for _ in 0..200 {
            if !self.feeds.lock().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no realtime subscriber");
    }

    /// Deliver a realtime update to every open feed.
    pub async fn push_patch(&self, patch: serde_json::Value) {
        let patch = ProfilePatch::from_value(patch).expect("patch must be an object");
        let feeds: Vec<_> = self
            .feeds
            .lock()
            .unwrap()
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        for feed in feeds {
            let _ = feed.send(patch.clone()).await;
        }
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let user_id = match self.accounts.lock().unwrap().get(email) {
            Some((stored, user_id)) if stored == password => user_id.clone(),
            _ => return Err(AppError::BackendRejected("Invalid login credentials".into())),
        };
        Ok(self.issue_session(
            SessionUser {
                id: user_id,
                email: Some(email.to_string()),
            },
            3600,
        ))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        if self.sign_up_hangs.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(AppError::BackendRejected("User already registered".into()));
        }
        let user_id = format!("user-{}", self.issued.load(Ordering::SeqCst));
        self.add_account(email, password, &user_id);
        if self.require_confirmation.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.issue_session(
            SessionUser {
                id: user_id,
                email: Some(email.to_string()),
            },
            3600,
        )))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AppError::BackendRejected("Invalid Refresh Token: Already Used".into()));
        }
        let user = self
            .tokens
            .lock()
            .unwrap()
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| AppError::BackendRejected("Invalid Refresh Token".into()))?;
        Ok(self.issue_session(user, 3600))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AppError> {
        self.remote_sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AppError> {
        self.tokens
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::InvalidSession("invalid JWT".into()))
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> String {
        format!(
            "https://backend.test/auth/v1/authorize?provider={}&redirect_to={}",
            provider,
            urlencoding::encode(redirect_to)
        )
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hang_profile_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_profile_reads.load(Ordering::SeqCst) {
            return Err(AppError::BackendRejected("JWT expired".into()));
        }
        if self.reject_expired_tokens.load(Ordering::SeqCst) {
            let expires_at = self.expiries.lock().unwrap().get(access_token).copied();
            // One second of slack: a token that passed the tracker's expiry
            // check must not fail here because the clock ticked.
            if expires_at.is_some_and(|exp| exp < now_unix()) {
                return Err(AppError::BackendRejected("JWT expired".into()));
            }
        }
        Ok(self.profile(user_id))
    }

    async fn upsert_profile(
        &self,
        _access_token: &str,
        row: &ProfileUpsert,
    ) -> Result<Profile, AppError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let patch = ProfilePatch::from_value(serde_json::to_value(row).unwrap())
            .expect("upsert rows serialize as objects");
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .entry(row.id.clone())
            .or_insert_with(|| Profile::degraded(&row.id));
        profile.merge(&patch);
        Ok(profile.clone())
    }

    async fn upload_avatar(
        &self,
        _access_token: &str,
        user_id: &str,
        file_name: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        Ok(format!(
            "https://backend.test/storage/v1/object/public/avatars/{}/{}",
            user_id, file_name
        ))
    }

    async fn subscribe_profile(
        &self,
        _access_token: &str,
        user_id: &str,
    ) -> Result<ProfileFeed, AppError> {
        let (tx, rx) = mpsc::channel(16);
        self.feeds.lock().unwrap().push((user_id.to_string(), tx));
        Ok(ProfileFeed::from_receiver(rx))
    }

    async fn probe(&self) -> Result<(), AppError> {
        if self.probe_hangs.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }
}

/// Profile row with the given flags.
#[allow(dead_code)]
pub fn profile(id: &str, phone: &str, is_approved: bool, is_admin: bool) -> Profile {
    Profile {
        phone_number: Some(phone.to_string()),
        full_name: Some("Test User".to_string()),
        is_approved,
        is_admin,
        ..Profile::degraded(id)
    }
}

/// Create a test app backed by `backend` (or unconfigured when `None`).
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(backend: Option<Arc<FakeBackend>>) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    if backend.is_none() {
        config.backend = None;
    }
    let backend = backend.map(|fake| fake as Arc<dyn Backend>);
    let state = Arc::new(AppState::new(config, backend));
    (create_router(state.clone()), state)
}
