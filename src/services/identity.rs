// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Phone-number identities.
//!
//! The backend only knows email-shaped identities, so phone logins are
//! encoded as `<digits>@<alias-domain>`. The encoding must round-trip
//! exactly: the admin phone allowlist is matched against decoded aliases.

use crate::error::AppError;

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 13;

/// Strip everything but digits and check the length.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(AppError::Validation("invalid phone number".to_string()));
    }
    Ok(digits)
}

/// Digits only, no validation; for comparing stored numbers.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Encoder/decoder for phone aliases under one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneAlias {
    domain: String,
}

impl PhoneAlias {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.trim().trim_start_matches('@').to_ascii_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `digits` must already be normalized.
    pub fn encode(&self, digits: &str) -> String {
        format!("{}@{}", digits, self.domain)
    }

    /// The phone digits behind an alias email, if `email` is one.
    pub fn decode(&self, email: &str) -> Option<String> {
        let (local, domain) = email.trim().rsplit_once('@')?;
        if !domain.eq_ignore_ascii_case(&self.domain) {
            return None;
        }
        if local.is_empty() || !local.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(local.to_string())
    }

    /// Turn a sign-in identifier (email or phone) into the backend identity.
    pub fn login_email(&self, identifier: &str) -> Result<String, AppError> {
        let identifier = identifier.trim();
        if identifier.contains('@') {
            return Ok(identifier.to_ascii_lowercase());
        }
        Ok(self.encode(&normalize_phone(identifier)?))
    }
}
