// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication session mirrored from the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionUser {
    /// Backend user identifier (also the profile primary key)
    pub id: String,
    /// Sign-in email; phone logins carry a `<digits>@<alias-domain>` alias
    #[serde(default)]
    pub email: Option<String>,
}

/// Live authentication credential issued by the backend.
///
/// Tokens are never serialized back out and are redacted from `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Session {
    #[serde(skip_serializing)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub access_token: String,
    #[serde(skip_serializing)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub refresh_token: String,
    /// When the access token expires (Unix timestamp)
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }

    /// Whether the access token has expired at `now` (Unix seconds).
    ///
    /// A session without an expiry is treated as live.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Session transition signalled by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl SessionEvent {
    /// The session in effect after this transition.
    pub fn into_session(self) -> Option<Session> {
        match self {
            SessionEvent::SignedIn(s) | SessionEvent::TokenRefreshed(s) => Some(s),
            SessionEvent::SignedOut => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn(_) => "signed_in",
            SessionEvent::TokenRefreshed(_) => "token_refreshed",
            SessionEvent::SignedOut => "signed_out",
        }
    }
}
