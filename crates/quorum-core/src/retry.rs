//! Bounded retry policies.
//!
//! Two distinct budgets exist on purpose:
//! - [`RetryPolicy`]: fixed-pause retry of individual I/O calls (store ops,
//!   analyzer invocations), applied inline by the caller via [`with_retry`].
//! - [`RequeuePolicy`]: increasing-delay redelivery of a whole job, applied by
//!   the queue layer after the worker reports a fatal failure.

use std::future::Future;
use std::time::Duration;

/// Fixed-pause retry for one I/O call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Treated as at least 1.
    pub attempts: u32,

    /// Pause between attempts.
    pub pause: Duration,
}

impl RetryPolicy {
    /// Default budget for store operations: 2 attempts, 1 second pause.
    pub fn store_default() -> Self {
        Self {
            attempts: 2,
            pause: Duration::from_secs(1),
        }
    }

    /// Default budget for analyzer calls: 2 attempts, 1 second pause.
    pub fn analysis_default() -> Self {
        Self {
            attempts: 2,
            pause: Duration::from_secs(1),
        }
    }

    /// Custom budget (tests use this with a zero pause).
    pub fn new(attempts: u32, pause: Duration) -> Self {
        Self { attempts, pause }
    }
}

/// Run `op` under `policy`, pausing between attempts.
///
/// Failures below the budget are logged and invisible to the caller; the last
/// error is returned once the budget is exhausted.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts => {
                tracing::warn!(%error, attempt, what, "call failed, retrying");
                tokio::time::sleep(policy.pause).await;
                attempt += 1;
            }
            Err(error) => {
                tracing::error!(%error, attempt, what, "call failed, retry budget exhausted");
                return Err(error);
            }
        }
    }
}

/// Increasing-delay redelivery policy for failed jobs.
///
/// delay = base_delay * multiplier^(attempts - 1). After `max_attempts`
/// deliveries the job is dead and never redelivered.
#[derive(Debug, Clone)]
pub struct RequeuePolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl RequeuePolicy {
    /// Default: 3 deliveries, 2s/4s backoff.
    pub fn default_v1() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }

    /// Delay before the next delivery, given the number of deliveries already
    /// made (1-indexed).
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn with_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let out: Result<u32, String> = with_retry(&policy, "op", || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Ok(7) }
        })
        .await;

        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn with_retry_recovers_within_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let out: Result<u32, String> = with_retry(&policy, "op", || {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            async move {
                if n < 2 {
                    Err(format!("boom {n}"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn with_retry_surfaces_last_error_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let out: Result<u32, String> = with_retry(&policy, "op", || {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            async move { Err(format!("boom {n}")) }
        })
        .await;

        assert_eq!(out.unwrap_err(), "boom 1");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn requeue_delay_increases() {
        let policy = RequeuePolicy::default_v1();
        let d1 = policy.next_delay(1);
        let d2 = policy.next_delay(2);
        assert_eq!(d1, Duration::from_secs(2));
        assert_eq!(d2, Duration::from_secs(4));
        assert!(d2 > d1);
    }
}
