// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for deadlines and unix time.

use crate::error::AppError;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;

/// Current time as a unix timestamp (seconds).
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Race `fut` against `limit`.
///
/// The underlying request is not aborted by the backend; it is only dropped
/// here, and the caller sees `AppError::Timeout(op)`.
pub async fn with_deadline<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation = op, limit_secs = limit.as_secs(), "Operation timed out");
            Err(AppError::Timeout(op))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let result: Result<(), AppError> = with_deadline("probe", Duration::from_secs(15), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(AppError::Timeout("probe"))));
    }

    #[tokio::test]
    async fn test_deadline_passes_through_result() {
        let ok = with_deadline("sign-in", Duration::from_secs(20), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<(), AppError> = with_deadline("sign-in", Duration::from_secs(20), async {
            Err(AppError::BackendRejected("Invalid login credentials".into()))
        })
        .await;
        assert!(matches!(err, Err(AppError::BackendRejected(_))));
    }
}
