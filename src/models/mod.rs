// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod authorization;
pub mod profile;
pub mod session;

pub use authorization::{AuthorizationState, BackendStatus, Flags, Level, Permissions};
pub use profile::{Profile, ProfilePatch, ProfileUpsert};
pub use session::{Session, SessionEvent, SessionUser};
