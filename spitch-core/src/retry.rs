//! Retry with exponential backoff
//!
//! [`RetryPolicy`] wraps any fallible operation. The blocking [`RetryPolicy::run`]
//! sleeps the calling thread between attempts; [`RetryPolicy::run_async`] awaits
//! `tokio::time::sleep` instead so it can share a runtime thread.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt cap and backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Factor applied to the delay after each retry
    pub multiplier: u32,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, waiting 0.5s then 1s.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Final result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: 2,
            max_delay: Duration::from_secs(2),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Policy that never retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delays inserted between attempts, in order (`max_attempts - 1` items).
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let mut delay = self.initial_delay;
        (1..self.max_attempts).map(move |_| {
            let current = delay.min(self.max_delay);
            delay = delay.saturating_mul(self.multiplier);
            current
        })
    }

    /// Run `op` until it succeeds or attempts run out, sleeping the thread between tries.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, op: F) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_with_sleep(op, std::thread::sleep)
    }

    /// Like [`RetryPolicy::run`] with a caller-supplied sleep.
    pub fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    let Some(delay) = delays.next() else {
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    };
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Async variant; backoff awaits `tokio::time::sleep`.
    pub async fn run_async<T, E, F, Fut>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let delays: Vec<Duration> = self.delays().collect();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    let Some(delay) = delays.get(attempt as usize - 1).copied() else {
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    };
                    tracing::debug!(
                        "Retrying (attempt {}/{}), waiting {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn default_schedule_doubles() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays.last(), Some(&Duration::from_secs(2)));
        assert_eq!(delays.len(), 4);
    }

    #[test]
    fn succeeds_on_third_attempt_after_recorded_sleeps() {
        let policy = RetryPolicy::default();
        let mut slept = Vec::new();
        let outcome = policy.run_with_sleep(
            |attempt| if attempt < 3 { Err("flaky") } else { Ok(attempt) },
            |d| slept.push(d),
        );
        assert_eq!(outcome.result, Ok(3));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(slept.iter().sum::<Duration>(), Duration::from_millis(1500));
    }

    #[test]
    fn gives_up_with_last_error() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let outcome: RetryOutcome<(), String> =
            policy.run(|attempt| Err(format!("failure {attempt}")));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap_err(), "failure 3");
    }

    #[test]
    fn once_never_sleeps() {
        let mut calls = 0;
        let outcome: RetryOutcome<(), &str> = RetryPolicy::once().run_with_sleep(
            |_| {
                calls += 1;
                Err("no")
            },
            |_| panic!("should not sleep"),
        );
        assert_eq!(calls, 1);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn blocking_run_actually_waits() {
        let policy = RetryPolicy::new(2, Duration::from_millis(20));
        let start = Instant::now();
        let outcome = policy.run(|attempt| if attempt == 1 { Err("x") } else { Ok(()) });
        assert!(outcome.result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn async_run_retries() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let outcome = policy
            .run_async(|attempt| async move {
                if attempt < 2 {
                    Err("transient")
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(outcome.result, Ok(2));
        assert_eq!(outcome.attempts, 2);
    }
}
