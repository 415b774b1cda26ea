// src/retry.rs
//! Bounded exponential backoff for outbound calls.
//!
//! The source API rate-limits aggressively, so every fetch goes through a
//! small retry budget with exponentially growing waits clamped to a fixed
//! band. `delay_after` is pure; the async `run` combinator owns the sleeps.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Floors at 1.
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, waits of `1s * 2^attempt` clamped into 4–10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps between attempts. Test runs only.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: Duration::ZERO,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before the attempt that follows `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self
            .multiplier
            .saturating_mul(2u32.saturating_pow(attempt.min(16)));
        exp.clamp(self.min_delay, self.max_delay)
    }

    /// Drive `op` until it succeeds or the attempt budget is spent.
    /// Every failure is logged with the call label; the last error is
    /// returned unchanged so the caller decides how to degrade.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt >= attempts => {
                    tracing::warn!(error = ?e, call = label, attempt, "giving up after final attempt");
                    return Err(e);
                }
                Err(e) => {
                    let wait = self.delay_after(attempt);
                    tracing::warn!(
                        error = ?e,
                        call = label,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
