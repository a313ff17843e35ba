//! Retry with exponential backoff.
//!
//! One policy shared by every boundary that talks to the network (sources
//! and notifiers). The normalization pipeline itself never retries.

use std::future::Future;
use std::time::{Duration, SystemTime};

use retry_policies::policies::ExponentialBackoff;
use retry_policies::{Jitter, RetryDecision, RetryPolicy as _};

use crate::error::{AppError, Result};
use crate::models::RetryConfig;

/// Bounded exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        let max_attempts = max_attempts.max(1);
        let backoff = ExponentialBackoff::builder()
            .retry_bounds(base_delay.min(max_delay), max_delay)
            .jitter(if jitter { Jitter::Bounded } else { Jitter::None })
            .build_with_max_retries(max_attempts - 1);
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.jitter,
        )
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, false)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the next try after failed attempt `attempt` (1-based),
    /// or `None` once attempts are exhausted.
    pub fn delay_for(&self, started: SystemTime, attempt: u32) -> Option<Duration> {
        match self
            .backoff
            .should_retry(started, attempt.saturating_sub(1))
        {
            RetryDecision::Retry { execute_after } => Some(
                execute_after
                    .duration_since(SystemTime::now())
                    .unwrap_or_default(),
            ),
            RetryDecision::DoNotRetry => None,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted. The final error
    /// is wrapped in [`AppError::RefreshFailed`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = SystemTime::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let Some(delay) = self.delay_for(started, attempt) else {
                        log::error!(
                            "{} failed after {} attempt(s): {}",
                            label,
                            attempt,
                            error
                        );
                        return Err(AppError::RefreshFailed {
                            attempts: attempt,
                            message: error.to_string(),
                        });
                    };
                    log::warn!(
                        "{} attempt {}/{} failed: {}. Retrying in {:?}",
                        label,
                        attempt,
                        self.max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            jitter,
        )
    }

    fn ms(d: Duration) -> u128 {
        d.as_millis()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(false);
        let started = SystemTime::now();
        let delays: Vec<u128> = (1..=4)
            .map(|attempt| ms(p.delay_for(started, attempt).unwrap()))
            .collect();

        assert!((50..=100).contains(&delays[0]));
        assert!((150..=200).contains(&delays[1]));
        assert!((750..=800).contains(&delays[3]));
        assert!(p.delay_for(started, 5).is_none());

        let long = RetryPolicy::new(40, Duration::from_millis(100), Duration::from_secs(1), false);
        assert!(ms(long.delay_for(started, 30).unwrap()) <= 1_000);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = policy(true);
        let started = SystemTime::now();
        for attempt in 1..=4 {
            for _ in 0..20 {
                let d = p.delay_for(started, attempt).unwrap();
                assert!(d <= Duration::from_millis(100 << (attempt - 1)));
            }
        }
    }

    #[test]
    fn base_above_max_is_clamped() {
        let p = RetryPolicy::new(3, Duration::from_secs(5), Duration::from_millis(50), false);
        let d = p.delay_for(SystemTime::now(), 1).unwrap();
        assert!(d <= Duration::from_millis(50));
    }

    #[test]
    fn single_attempt_never_waits() {
        assert!(RetryPolicy::none().delay_for(SystemTime::now(), 1).is_none());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let p = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, false);

        let value = p
            .run("flaky", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::source_unavailable("test", "boom"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let p = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO, false);

        let result: Result<()> = p
            .run("down", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::source_unavailable("test", "down"))
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::RefreshFailed { attempts: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
