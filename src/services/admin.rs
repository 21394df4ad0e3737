// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin detection.
//!
//! A user is an administrator if ANY of the checks below matches. The
//! profile flag is authoritative; the email and phone allowlists are legacy
//! paths kept until the flag is populated for every admin.

use super::identity::{phone_digits, PhoneAlias};
use crate::config::Config;
use crate::models::Profile;
use std::collections::HashSet;

/// What the checks look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthContext<'a> {
    /// Sign-in email of the live session
    pub email: Option<&'a str>,
    pub profile: Option<&'a Profile>,
}

/// One admin-detection predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCheck {
    /// `profile.is_admin`
    ProfileFlag,
    /// Session email in the admin email allowlist
    EmailAllowlist,
    /// `profile.phone_number` in the admin phone allowlist
    PhoneAllowlist,
    /// Session email is a phone alias whose digits are in the phone allowlist
    PhoneAlias,
}

impl AdminCheck {
    pub const ALL: [AdminCheck; 4] = [
        AdminCheck::ProfileFlag,
        AdminCheck::EmailAllowlist,
        AdminCheck::PhoneAllowlist,
        AdminCheck::PhoneAlias,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdminCheck::ProfileFlag => "profile_flag",
            AdminCheck::EmailAllowlist => "email_allowlist",
            AdminCheck::PhoneAllowlist => "phone_allowlist",
            AdminCheck::PhoneAlias => "phone_alias",
        }
    }
}

/// Allowlists plus the alias codec.
#[derive(Debug, Clone)]
pub struct AdminPolicy {
    emails: HashSet<String>,
    phones: HashSet<String>,
    alias: PhoneAlias,
}

impl AdminPolicy {
    pub fn new<E, P>(emails: E, phones: P, alias_domain: &str) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            phones: phones
                .into_iter()
                .map(|p| phone_digits(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
            alias: PhoneAlias::new(alias_domain),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.admin_emails,
            &config.admin_phones,
            &config.phone_alias_domain,
        )
    }

    pub fn alias(&self) -> &PhoneAlias {
        &self.alias
    }

    /// Evaluate a single check.
    pub fn matches(&self, check: AdminCheck, ctx: &AuthContext<'_>) -> bool {
        match check {
            AdminCheck::ProfileFlag => ctx.profile.map(|p| p.is_admin).unwrap_or(false),
            AdminCheck::EmailAllowlist => ctx
                .email
                .map(|e| self.emails.contains(&e.trim().to_ascii_lowercase()))
                .unwrap_or(false),
            AdminCheck::PhoneAllowlist => ctx
                .profile
                .and_then(|p| p.phone_number.as_deref())
                .map(|phone| self.phones.contains(&phone_digits(phone)))
                .unwrap_or(false),
            AdminCheck::PhoneAlias => ctx
                .email
                .and_then(|e| self.alias.decode(e))
                .map(|digits| self.phones.contains(&digits))
                .unwrap_or(false),
        }
    }

    /// First matching check, for diagnostics.
    pub fn detect(&self, ctx: &AuthContext<'_>) -> Option<AdminCheck> {
        AdminCheck::ALL
            .into_iter()
            .find(|check| self.matches(*check, ctx))
    }

    pub fn is_admin(&self, ctx: &AuthContext<'_>) -> bool {
        self.detect(ctx).is_some()
    }
}
