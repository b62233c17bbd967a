//! Circuit breakers around outbound calls.
//!
//! Policy:
//! - 5 consecutive failures open the circuit
//! - 30 seconds cool-down before a half-open retry

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use failsafe::futures::CircuitBreaker;
use failsafe::{Config, Error, StateMachine, backoff, failure_policy};

use crate::error::AppError;

pub type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

pub const FAILURE_THRESHOLD: u32 = 5;
pub const COOL_DOWN: Duration = Duration::from_secs(30);

pub fn breaker() -> Breaker {
    breaker_with(FAILURE_THRESHOLD, COOL_DOWN)
}

pub fn breaker_with(threshold: u32, cool_down: Duration) -> Breaker {
    Config::new()
        .failure_policy(failure_policy::consecutive_failures(
            threshold,
            backoff::constant(cool_down),
        ))
        .build()
}

/// Run `operation` through the breaker.
///
/// Inner failures go through `on_error`; a rejected call (open circuit)
/// becomes `ServiceUnavailable`.
pub async fn guarded<T, E, Fut>(
    breaker: &Breaker,
    service: &str,
    operation: Fut,
    on_error: impl FnOnce(E) -> AppError,
) -> Result<T, AppError>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match breaker.call(operation).await {
        Ok(value) => Ok(value),
        Err(Error::Inner(e)) => Err(on_error(e)),
        Err(Error::Rejected) => {
            tracing::warn!(service, "Circuit open, call rejected");
            Err(AppError::ServiceUnavailable(format!(
                "{service} is temporarily unavailable"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let cb = breaker();

        for _ in 0..FAILURE_THRESHOLD {
            let result = guarded(
                &cb,
                "object storage",
                async { Err::<(), _>(io::Error::other("boom")) },
                |e| AppError::Storage(e.to_string()),
            )
            .await;
            assert!(matches!(result, Err(AppError::Storage(_))));
        }

        let result = guarded(&cb, "object storage", async { Ok::<_, io::Error>(1) }, |e| {
            AppError::Storage(e.to_string())
        })
        .await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn success_resets_the_count() {
        let cb = breaker_with(2, Duration::from_secs(60));
        let fail = || async { Err::<(), _>(io::Error::other("boom")) };

        let _ = guarded(&cb, "svc", fail(), |e| AppError::Internal(e.to_string())).await;
        let ok = guarded(&cb, "svc", async { Ok::<_, io::Error>(()) }, |e| {
            AppError::Internal(e.to_string())
        })
        .await;
        assert!(ok.is_ok());

        let second = guarded(&cb, "svc", fail(), |e| AppError::Internal(e.to_string())).await;
        assert!(matches!(second, Err(AppError::Internal(_))));
    }
}
