// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The backend credentials are optional: when either is missing the
//! application runs in a degraded "service not configured" mode instead of
//! failing at startup.

use std::env;
use std::time::Duration;

/// Deadline for password / OAuth sign-in round trips.
pub const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(20);

/// Deadline for read-only connectivity probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a route guard waits for the resolver to leave its loading state.
pub const GUARD_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

/// Browser sessions untouched for this long are evicted from the registry.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Authentication entry point; denied guards and invalid sessions land here.
pub const AUTH_ENTRY_PATH: &str = "/auth";

/// Cookie carrying the opaque browser-session key.
pub const SESSION_COOKIE: &str = "role_hub_session";

/// Domain used to encode phone numbers as email-shaped identities.
pub const DEFAULT_PHONE_ALIAS_DOMAIN: &str = "email.com";

const DEFAULT_APPROVAL_POLL_SECS: u64 = 5;

/// Credentials for the backend-as-a-service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Service base URL, without a trailing slash
    pub url: String,
    /// Anonymous (public) API key
    pub anon_key: String,
}

impl BackendConfig {
    /// Build from the two raw configuration values.
    ///
    /// Returns `None` when either value is absent or blank.
    pub fn from_parts(url: Option<String>, anon_key: Option<String>) -> Option<Self> {
        let url = url.map(|u| u.trim().trim_end_matches('/').to_string())?;
        let anon_key = anon_key.map(|k| k.trim().to_string())?;
        if url.is_empty() || anon_key.is_empty() {
            return None;
        }
        Some(Self { url, anon_key })
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend credentials; `None` means the service is not configured
    pub backend: Option<BackendConfig>,
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Legacy admin allowlist by sign-in email
    pub admin_emails: Vec<String>,
    /// Legacy admin allowlist by phone number (digits)
    pub admin_phones: Vec<String>,
    /// Domain appended to phone digits to form the sign-in identity
    pub phone_alias_domain: String,
    /// Interval of the approval poller
    pub approval_poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let backend = BackendConfig::from_parts(
            env::var("SUPABASE_URL").ok(),
            env::var("SUPABASE_ANON_KEY").ok(),
        );
        if backend.is_none() {
            tracing::warn!("SUPABASE_URL or SUPABASE_ANON_KEY missing; backend not configured");
        }

        let poll_secs = match env::var("APPROVAL_POLL_SECS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("APPROVAL_POLL_SECS"))?,
            Err(_) => DEFAULT_APPROVAL_POLL_SECS,
        };

        Ok(Self {
            backend,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            admin_emails: split_list(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            admin_phones: split_list(&env::var("ADMIN_PHONES").unwrap_or_default()),
            phone_alias_domain: env::var("PHONE_ALIAS_DOMAIN")
                .map(|d| d.trim().to_string())
                .ok()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_PHONE_ALIAS_DOMAIN.to_string()),
            approval_poll_interval: Duration::from_secs(poll_secs),
        })
    }

    /// Config for tests: backend configured against an unroutable host.
    pub fn test_default() -> Self {
        Self {
            backend: Some(BackendConfig {
                url: "http://127.0.0.1:9".to_string(),
                anon_key: "test-anon-key".to_string(),
            }),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            admin_emails: vec!["admin@example.com".to_string()],
            admin_phones: vec!["11996098995".to_string()],
            phone_alias_domain: DEFAULT_PHONE_ALIAS_DOMAIN.to_string(),
            approval_poll_interval: Duration::from_secs(DEFAULT_APPROVAL_POLL_SECS),
        }
    }
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_requires_both_values() {
        assert!(BackendConfig::from_parts(None, Some("key".into())).is_none());
        assert!(BackendConfig::from_parts(Some("https://x.supabase.co".into()), None).is_none());
        assert!(BackendConfig::from_parts(Some("  ".into()), Some("key".into())).is_none());

        let cfg = BackendConfig::from_parts(
            Some("https://x.supabase.co/".into()),
            Some(" key ".into()),
        )
        .unwrap();
        assert_eq!(cfg.url, "https://x.supabase.co");
        assert_eq!(cfg.anon_key, "key");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" a@x.com, ,b@x.com,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("SUPABASE_URL", "https://project.supabase.co");
        env::set_var("SUPABASE_ANON_KEY", "anon");
        env::set_var("ADMIN_PHONES", "11996098995,75981423232");
        env::remove_var("APPROVAL_POLL_SECS");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(
            config.backend.as_ref().map(|b| b.url.as_str()),
            Some("https://project.supabase.co")
        );
        assert_eq!(config.admin_phones.len(), 2);
        assert_eq!(config.approval_poll_interval, Duration::from_secs(5));
        assert_eq!(config.phone_alias_domain, DEFAULT_PHONE_ALIAS_DOMAIN);
    }
}
