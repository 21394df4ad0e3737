// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived authorization state consumed by guards and pages.

use super::{Profile, Session};
use serde::{Serialize, Serializer};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Role rank driving feature gating. Serialized as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Guest = 1,
    Member = 2,
    Admin = 3,
}

impl Level {
    /// Admin wins outright; members need a live session and approval.
    pub fn derive(is_admin: bool, has_session: bool, is_approved: bool) -> Self {
        if is_admin {
            Level::Admin
        } else if has_session && is_approved {
            Level::Member
        } else {
            Level::Guest
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Whether the backend handle exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Available,
    NotConfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    /// Session present and the profile is approved (or the user is admin)
    pub is_authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_create_events: bool,
    pub can_comment: bool,
    pub can_confirm_presence: bool,
    pub can_create_polls: bool,
    pub can_edit_own_profile: bool,
    pub can_access_admin: bool,
}

impl Permissions {
    pub fn for_level(level: Level, has_session: bool) -> Self {
        let member = level >= Level::Member;
        let admin = level == Level::Admin;
        Self {
            can_create_events: admin,
            can_comment: member,
            can_confirm_presence: member,
            can_create_polls: member,
            can_edit_own_profile: has_session,
            can_access_admin: admin,
        }
    }
}

/// Application-wide authorization snapshot.
///
/// Only the resolver produces these; everyone else reads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationState {
    pub loading: bool,
    pub backend: BackendStatus,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    #[cfg_attr(feature = "binding-generation", ts(type = "1 | 2 | 3"))]
    pub level: Level,
    pub flags: Flags,
    pub permissions: Permissions,
}

impl AuthorizationState {
    /// Before the session has been looked up.
    pub fn initial() -> Self {
        Self {
            loading: true,
            ..Self::guest()
        }
    }

    /// Resolved, anonymous.
    pub fn guest() -> Self {
        Self {
            loading: false,
            backend: BackendStatus::Available,
            session: None,
            profile: None,
            level: Level::Guest,
            flags: Flags::default(),
            permissions: Permissions::for_level(Level::Guest, false),
        }
    }

    /// Terminal state when there is no backend handle.
    pub fn not_configured() -> Self {
        Self {
            backend: BackendStatus::NotConfigured,
            ..Self::guest()
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(Session::user_id)
    }
}
