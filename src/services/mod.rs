// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session and authorization logic.

pub mod admin;
pub mod approval_poller;
pub mod identity;
pub mod profile_listener;
pub mod profile_loader;
pub mod resolver;
pub mod session_tracker;

pub use admin::{AdminCheck, AdminPolicy, AuthContext};
pub use identity::{normalize_phone, PhoneAlias};
pub use profile_loader::ProfileLoader;
pub use resolver::{AuthResolver, ProfileChange, ProfileMessage, ResolverInputs, ResolverOptions};
pub use session_tracker::{SessionPhase, SessionTracker};
