//! Bounded retry with a backoff schedule.
//!
//! [`retry`] runs an async operation up to `max_attempts` times. Between
//! attempts it waits for the schedule entry matching the attempt number;
//! attempts beyond the end of the schedule reuse the last entry. A predicate
//! decides which errors are worth another attempt.
//!
//! Waiting goes through a [`Clock`] so callers can inject a clock that
//! records delays instead of sleeping. The runtime-backed clock lives in the
//! application crate; this crate stays executor-agnostic.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep(schedule[0]) ──▶ attempt 2 ──fail──▶ sleep(schedule[1]) ──▶ …
//! ```

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Source of delays between attempts.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Clock that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the n-th failed attempt; the last entry caps the schedule.
    pub schedule: Vec<Duration>,
    /// Also wait after the final failed attempt before giving up.
    pub backoff_after_last: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, schedule: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            schedule,
            backoff_after_last: false,
        }
    }

    /// `1 + max_retries` attempts with delays 1s, 2s, 4s, … capped at `2^cap_exp` seconds.
    pub fn exponential(max_retries: u32, cap_exp: u32) -> Self {
        let schedule = (0..=cap_exp)
            .map(|exp| Duration::from_secs(1u64 << exp))
            .collect();
        Self::new(max_retries.saturating_add(1), schedule)
    }

    pub fn with_backoff_after_last(mut self, enabled: bool) -> Self {
        self.backoff_after_last = enabled;
        self
    }

    /// Delay following the failed attempt at zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.schedule.len() {
            0 => Duration::ZERO,
            len => self.schedule[(attempt as usize).min(len - 1)],
        }
    }
}

/// Terminal failure of a retried operation.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts actually made.
    pub attempts: u32,
    pub last: E,
}

/// Run `op` under `policy`, retrying errors for which `is_retryable` holds.
///
/// `op` receives the zero-based attempt number. Each attempt is a fresh call;
/// nothing carries over between attempts except that counter.
pub async fn retry<T, E, C, P, F, Fut>(
    policy: &RetryPolicy,
    clock: &C,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    C: Clock + ?Sized,
    P: Fn(&E) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let made = attempt + 1;
                if !is_retryable(&err) {
                    return Err(RetryError {
                        attempts: made,
                        last: err,
                    });
                }
                let exhausted = made >= max_attempts;
                if !exhausted || policy.backoff_after_last {
                    clock.sleep(policy.delay_for(attempt)).await;
                }
                if exhausted {
                    return Err(RetryError {
                        attempts: made,
                        last: err,
                    });
                }
                attempt = made;
            }
        }
    }
}
