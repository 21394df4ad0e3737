// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization resolver.
//!
//! One driver task owns the session/profile inputs and is the only writer
//! of the published `AuthorizationState`. Realtime patches and poller
//! refetches arrive as messages on one channel and go through
//! `ProfileChange::apply`; messages from an earlier user (older generation)
//! are dropped. A failed poll arrives on the same channel and forces the
//! sign-out path.

use super::admin::{AdminPolicy, AuthContext};
use super::profile_loader::ProfileLoader;
use super::session_tracker::{SessionPhase, SessionTracker};
use super::{approval_poller, profile_listener};
use crate::config::{Config, AUTH_ENTRY_PATH};
use crate::error::AppError;
use crate::models::{
    AuthorizationState, BackendStatus, Flags, Level, Permissions, Profile, ProfilePatch, Session,
};
use crate::task::TaskGuard;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

const UPDATE_BUFFER: usize = 32;

/// Incremental change to the in-memory profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileChange {
    /// Realtime notification: merge present fields only.
    Patch(ProfilePatch),
    /// Fresh row from a refetch.
    Replace(Profile),
}

impl ProfileChange {
    /// Apply to `current`; returns whether it changed.
    ///
    /// Patches are idempotent and a replace is last-write-wins, so the
    /// interleaving of listener and poller does not matter.
    pub fn apply(self, current: &mut Option<Profile>) -> bool {
        match self {
            ProfileChange::Replace(profile) => {
                let changed = current.as_ref() != Some(&profile);
                *current = Some(profile);
                changed
            }
            ProfileChange::Patch(patch) => match current {
                Some(profile) => profile.merge(&patch),
                None => match patch.to_profile() {
                    Some(profile) => {
                        *current = Some(profile);
                        true
                    }
                    None => false,
                },
            },
        }
    }
}

/// A change (or a failed read) tagged with the user generation that
/// produced it.
#[derive(Debug)]
pub struct ProfileMessage {
    pub generation: u64,
    pub change: Result<ProfileChange, AppError>,
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub poll_interval: Duration,
}

impl ResolverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.approval_poll_interval,
        }
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Raw inputs the published state is derived from.
#[derive(Debug, Clone)]
pub struct ResolverInputs {
    pub session: SessionPhase,
    pub profile: Option<Profile>,
    /// At least one fetch for the current user has completed
    pub profile_fetched: bool,
}

impl Default for ResolverInputs {
    fn default() -> Self {
        Self {
            session: SessionPhase::Uninitialized,
            profile: None,
            profile_fetched: false,
        }
    }
}

impl ResolverInputs {
    fn context(&self) -> AuthContext<'_> {
        AuthContext {
            email: self.session.session().and_then(Session::email),
            profile: self.profile.as_ref(),
        }
    }

    fn is_approved(&self) -> bool {
        self.profile.as_ref().map(|p| p.is_approved).unwrap_or(false)
    }

    pub fn derive(&self, policy: &AdminPolicy) -> AuthorizationState {
        let session = self.session.session();
        let has_session = session.is_some();
        let is_admin = policy.is_admin(&self.context());
        let is_approved = self.is_approved();
        let level = Level::derive(is_admin, has_session, is_approved);

        AuthorizationState {
            // No flash of "anonymous" between sign-in and the first profile.
            loading: self.session.is_loading() || (has_session && !self.profile_fetched),
            backend: BackendStatus::Available,
            session: session.cloned(),
            profile: self.profile.clone(),
            level,
            flags: Flags {
                is_authenticated: has_session && (is_approved || is_admin),
            },
            permissions: Permissions::for_level(level, has_session),
        }
    }

    /// Poll only for signed-in users that are neither approved nor admin.
    pub fn should_poll(&self, policy: &AdminPolicy) -> bool {
        self.session.session().is_some()
            && self.profile_fetched
            && !self.is_approved()
            && !policy.is_admin(&self.context())
    }
}

/// Handle to a running resolver. Dropping it stops the driver along with
/// its listener and poller.
pub struct AuthResolver {
    state_tx: Arc<watch::Sender<AuthorizationState>>,
    redirect_tx: Arc<watch::Sender<Option<String>>>,
    _driver: Option<TaskGuard>,
}

impl AuthResolver {
    /// Start resolving. Without a tracker (no backend) the state is final
    /// immediately: not configured, guest, not loading.
    pub fn spawn(
        tracker: Option<Arc<SessionTracker>>,
        policy: Arc<AdminPolicy>,
        options: ResolverOptions,
    ) -> Self {
        let Some(tracker) = tracker else {
            let (state_tx, _) = watch::channel(AuthorizationState::not_configured());
            let (redirect_tx, _) = watch::channel(None);
            return Self {
                state_tx: Arc::new(state_tx),
                redirect_tx: Arc::new(redirect_tx),
                _driver: None,
            };
        };

        let (state_tx, _) = watch::channel(AuthorizationState::initial());
        let (redirect_tx, _) = watch::channel(None);
        let state_tx = Arc::new(state_tx);
        let redirect_tx = Arc::new(redirect_tx);
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_BUFFER);

        let driver = Driver {
            loader: ProfileLoader::new(tracker.backend().clone()),
            tracker,
            policy,
            options,
            inputs: ResolverInputs::default(),
            generation: 0,
            state_tx: state_tx.clone(),
            redirect_tx: redirect_tx.clone(),
            updates_tx,
            listener: None,
            poller: None,
        };

        Self {
            state_tx,
            redirect_tx,
            _driver: Some(TaskGuard::spawn(driver.run(updates_rx))),
        }
    }

    /// Latest published state.
    pub fn current(&self) -> AuthorizationState {
        self.state_tx.borrow().clone()
    }

    /// Read-only view that is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationState> {
        self.state_tx.subscribe()
    }

    /// Wait until the state is no longer loading.
    pub async fn resolved(&self) -> AuthorizationState {
        let mut rx = self.subscribe();
        let resolved = rx.wait_for(|state| !state.loading).await.map(|s| s.clone());
        resolved.unwrap_or_else(|_| self.current())
    }

    /// Navigation requested by the resolver (the auth entry point after a
    /// forced sign-out).
    pub fn redirects(&self) -> watch::Receiver<Option<String>> {
        self.redirect_tx.subscribe()
    }

    pub fn pending_redirect(&self) -> Option<String> {
        self.redirect_tx.borrow().clone()
    }
}

struct Driver {
    tracker: Arc<SessionTracker>,
    loader: ProfileLoader,
    policy: Arc<AdminPolicy>,
    options: ResolverOptions,
    inputs: ResolverInputs,
    generation: u64,
    state_tx: Arc<watch::Sender<AuthorizationState>>,
    redirect_tx: Arc<watch::Sender<Option<String>>>,
    updates_tx: mpsc::Sender<ProfileMessage>,
    listener: Option<TaskGuard>,
    poller: Option<TaskGuard>,
}

impl Driver {
    async fn run(mut self, mut updates_rx: mpsc::Receiver<ProfileMessage>) {
        // Subscribe before the first read so no transition slips through.
        let mut events = self.tracker.on_session_change();

        self.inputs.session = SessionPhase::Loading;
        self.publish();

        let initial = self.current_session().await;
        self.on_session(initial).await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.on_session(event.into_session()).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed session transitions, resyncing");
                        let current = self.current_session().await;
                        self.on_session(current).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(message) = updates_rx.recv() => self.on_profile_message(message).await,
            }
        }
    }

    /// Read the tracker's session; an unrecoverable one is dropped.
    async fn current_session(&mut self) -> Option<Session> {
        match self.tracker.get_current_session().await {
            Ok(session) => session,
            Err(e) if e.is_session_error() => {
                tracing::warn!(error = %e, "Stored session rejected, signing out");
                self.tracker.clear_local().await;
                self.tracker.sign_out().await;
                self.request_redirect();
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read session");
                None
            }
        }
    }

    async fn on_session(&mut self, session: Option<Session>) {
        let previous_user = self.inputs.session.session().map(|s| s.user_id().to_string());
        let next_user = session.as_ref().map(|s| s.user_id().to_string());

        if previous_user == next_user {
            // Token refresh (or a repeated notification): keep the profile.
            self.inputs.session = SessionPhase::from(session);
            self.reconcile_poller();
            self.publish();
            return;
        }

        self.generation += 1;
        self.listener = None;
        self.poller = None;
        self.inputs.profile = None;
        self.inputs.profile_fetched = false;
        self.inputs.session = SessionPhase::from(session.clone());
        tracing::info!(
            user_id = next_user.as_deref().unwrap_or("<none>"),
            generation = self.generation,
            "Session user changed"
        );

        let Some(session) = session else {
            self.publish();
            return;
        };

        self.redirect_tx.send_replace(None);
        self.publish();

        match self.loader.load(&session).await {
            Ok(profile) => {
                self.inputs.profile = profile;
                self.inputs.profile_fetched = true;
                self.listener = Some(profile_listener::spawn(
                    self.tracker.backend().clone(),
                    session,
                    self.generation,
                    self.updates_tx.clone(),
                ));
            }
            Err(e) => self.recover_invalid_session(&session, e).await,
        }

        self.reconcile_poller();
        self.publish();
    }

    /// A failed profile read means the session is no longer usable: drop
    /// local credentials, sign out, send the user to the auth entry point,
    /// and settle on a degraded profile instead of loading forever.
    async fn recover_invalid_session(&mut self, session: &Session, error: AppError) {
        tracing::warn!(
            user_id = %session.user_id(),
            error = %error,
            "Profile fetch failed, forcing sign-out"
        );

        self.tracker.clear_local().await;
        self.tracker.sign_out().await;

        self.generation += 1;
        self.listener = None;
        self.poller = None;
        self.inputs.session = SessionPhase::Anonymous;
        self.inputs.profile = Some(Profile::degraded(session.user_id()));
        self.inputs.profile_fetched = true;
        self.request_redirect();
    }

    fn request_redirect(&self) {
        self.redirect_tx
            .send_replace(Some(AUTH_ENTRY_PATH.to_string()));
    }

    async fn on_profile_message(&mut self, message: ProfileMessage) {
        let Some(session) = self.inputs.session.session().cloned() else {
            tracing::trace!(generation = message.generation, "Dropping profile change, no session");
            return;
        };
        if message.generation != self.generation {
            tracing::trace!(generation = message.generation, "Dropping stale profile change");
            return;
        }

        let change = match message.change {
            Ok(change) => change,
            Err(e) => {
                self.recover_invalid_session(&session, e).await;
                self.publish();
                return;
            }
        };
        if change.apply(&mut self.inputs.profile) {
            self.inputs.profile_fetched = true;
            self.reconcile_poller();
            self.publish();
        }
    }

    fn reconcile_poller(&mut self) {
        let wanted = self.inputs.should_poll(&self.policy);
        match (wanted, self.poller.is_some()) {
            (true, false) => {
                if let Some(session) = self.inputs.session.session() {
                    tracing::info!(user_id = %session.user_id(), "Awaiting approval, polling profile");
                    self.poller = Some(approval_poller::spawn(
                        self.tracker.clone(),
                        self.loader.clone(),
                        self.options.poll_interval,
                        self.generation,
                        self.updates_tx.clone(),
                    ));
                }
            }
            (false, true) => {
                tracing::info!("Approval poller stopped");
                self.poller = None;
            }
            _ => {}
        }
    }

    fn publish(&self) {
        let next = self.inputs.derive(&self.policy);
        let policy = &self.policy;
        let inputs = &self.inputs;
        self.state_tx.send_if_modified(move |current| {
            if *current == next {
                return false;
            }
            if current.level != next.level {
                tracing::info!(
                    user_id = next.user_id().unwrap_or("<none>"),
                    level = next.level.as_u8(),
                    admin_check = policy.detect(&inputs.context()).map(|c| c.name()),
                    "Authorization level changed"
                );
            }
            *current = next;
            true
        });
    }
}
