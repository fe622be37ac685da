//! Async retry with exponential backoff, jitter and an elapsed-time budget

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::config::RetryConfig;

/// Exponential backoff interval generator
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            current: config.initial_interval,
            max_interval: config.max_interval,
            multiplier: config.multiplier,
            randomization_factor: config.randomization_factor,
        }
    }

    /// Next wait, randomized within `current * (1 ± randomization_factor)`
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = scale(base, self.multiplier)
            .unwrap_or(self.max_interval)
            .min(self.max_interval);

        if self.randomization_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let delta = self.randomization_factor;
        let factor = rand::thread_rng().gen_range((1.0 - delta)..=(1.0 + delta));
        scale(base, factor).unwrap_or(base)
    }
}

/// `duration * factor`, or `None` when the product is not a valid `Duration`
fn scale(duration: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).ok()
}

/// Terminal failure of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Operation failed with an error that retrying cannot fix
    Permanent { error: E, attempts: u32 },
    /// Retry disabled, or the next wait would cross the elapsed-time budget
    Exhausted {
        error: E,
        attempts: u32,
        elapsed: Duration,
    },
    /// Token cancelled before or between attempts
    Cancelled { attempts: u32 },
}

/// Successful result and the attempt that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Retry an async operation until success, a permanent error, budget
/// exhaustion or cancellation.
pub async fn retry_with_backoff_async<F, Fut, T, E, R>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    is_retryable: R,
    mut operation: F,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let start = Instant::now();
    let mut backoff = Backoff::new(config);
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts });
        }
        attempts += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
            result = operation() => result,
        };

        let error = match result {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts,
                    elapsed: start.elapsed(),
                });
            }
            Err(e) if !is_retryable(&e) => {
                return Err(RetryError::Permanent { error: e, attempts });
            }
            Err(e) => e,
        };

        let elapsed = start.elapsed();
        if !config.enabled {
            return Err(RetryError::Exhausted {
                error,
                attempts,
                elapsed,
            });
        }

        let delay = backoff.next_delay();
        if elapsed.saturating_add(delay) > config.max_elapsed_time {
            return Err(RetryError::Exhausted {
                error,
                attempts,
                elapsed,
            });
        }

        tracing::warn!(
            error = %error,
            attempt = attempts,
            delay_ms = delay.as_millis(),
            "Retrying after transient error"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn config(initial_secs: u64, max_secs: u64, elapsed_secs: u64) -> RetryConfig {
        RetryConfig {
            enabled: true,
            initial_interval: Duration::from_secs(initial_secs),
            max_interval: Duration::from_secs(max_secs),
            max_elapsed_time: Duration::from_secs(elapsed_secs),
            multiplier: 2.0,
            randomization_factor: 0.0,
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = Backoff::new(&config(1, 4, 60));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 4, 4]);
    }

    #[test]
    fn test_backoff_jitter_within_bounds() {
        let mut cfg = config(10, 10, 60);
        cfg.randomization_factor = 0.5;
        let mut backoff = Backoff::new(&cfg);
        for _ in 0..100 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_backoff_huge_multiplier_caps_at_max() {
        let mut cfg = config(1, 30, 60);
        cfg.multiplier = 1e300;
        let mut backoff = Backoff::new(&cfg);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_jitter_on_max_duration() {
        let mut cfg = config(1, 1, 60);
        cfg.initial_interval = Duration::MAX;
        cfg.max_interval = Duration::MAX;
        cfg.randomization_factor = 0.5;
        let mut backoff = Backoff::new(&cfg);
        // must not panic when the jittered product overflows
        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_try() {
        let cancel = CancellationToken::new();
        let result = retry_with_backoff_async(&config(1, 4, 60), &cancel, |_: &&str| true, || async {
            Ok::<_, &str>(7)
        })
        .await
        .unwrap();
        assert_eq!(result.value, 7);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_two_failures() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry_with_backoff_async(&config(1, 4, 60), &cancel, |_: &&str| true, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("transient error")
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.elapsed, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_stops_immediately() {
        let cancel = CancellationToken::new();
        let result = retry_with_backoff_async(&config(1, 4, 60), &cancel, |_: &&str| false, || async {
            Err::<(), _>("bad request")
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Permanent {
                error: "bad request",
                attempts: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_when_budget_crossed() {
        let cancel = CancellationToken::new();
        // waits 1, 2, 4 fit in 10s; the next 4s wait would end at 11s
        let result = retry_with_backoff_async(&config(1, 4, 10), &cancel, |_: &&str| true, || async {
            Err::<(), _>("unavailable")
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                error: "unavailable",
                attempts: 4,
                elapsed: Duration::from_secs(7),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_retry_exhausts_after_one_attempt() {
        let cancel = CancellationToken::new();
        let mut cfg = config(1, 4, 60);
        cfg.enabled = false;
        let result =
            retry_with_backoff_async(&cfg, &cancel, |_: &&str| true, || async { Err::<(), _>("down") })
                .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result = retry_with_backoff_async(&config(5, 5, 60), &cancel, |_: &&str| true, || async {
            Err::<(), _>("unavailable")
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff_async(&config(1, 1, 1), &cancel, |_: &&str| true, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &str>(())
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled { attempts: 0 }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
