// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    /// The backend no longer accepts the session (revoked or stale refresh token).
    #[error("Invalid or expired session: {0}")]
    InvalidSession(String),

    /// No backend handle: the service URL or anonymous key is missing.
    #[error("Backend service not configured")]
    NotConfigured,

    #[error("Connection timed out during {0}")]
    Timeout(&'static str),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The backend answered with a 4xx; the message is the backend's own.
    #[error("{0}")]
    BackendRejected(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_) | AppError::Backend(_))
    }

    /// Whether the error means the current session must be dropped.
    pub fn is_session_error(&self) -> bool {
        matches!(self, AppError::InvalidSession(_) | AppError::Unauthorized)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidSession(_) => (StatusCode::UNAUTHORIZED, "invalid_session", None),
            AppError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_not_configured",
                None,
            ),
            AppError::Timeout(op) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                Some(format!("Connection timed out ({})", op)),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::BackendRejected(msg) => {
                (StatusCode::BAD_REQUEST, "backend_rejected", Some(msg.clone()))
            }
            AppError::Backend(msg) => {
                tracing::warn!(error = %msg, "Backend error");
                (StatusCode::BAD_GATEWAY, "backend_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
