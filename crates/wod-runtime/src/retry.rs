//! Reusable retry driver.
//!
//! [`retry_with_backoff`] runs an async operation up to
//! [`RetryPolicy::max_attempts`] times. The caller supplies both the delay
//! schedule and the predicate deciding which errors are worth another try.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use wod_core::error::{EtlError, Result};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Ceiling for rate-limit back-off.
const RATE_LIMIT_CAP_SECS: f64 = 300.0;
/// First rate-limit delay; doubled on every further attempt.
const RATE_LIMIT_BASE_SECS: f64 = 5.0;
/// Server hints are multiplied by this before being compared to the schedule.
const HINT_MULTIPLIER: f64 = 4.0;
/// Ceiling for generic transient errors.
const TRANSIENT_CAP_SECS: f64 = 30.0;

static RETRY_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)try again in\s+(\d+(?:\.\d+)?)(ms|s)\b").expect("regex is valid")
});

// ── RetryPolicy ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 6 }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. `backoff` is consulted after
/// every retryable failure except the last; the error it is given is the
/// one that just occurred. The last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut, B, P>(
    policy: RetryPolicy,
    backoff: B,
    is_retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    B: Fn(u32, &EtlError) -> Duration,
    P: Fn(&EtlError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable(&e) {
                    tracing::debug!(attempt, error = %e, "non-retryable failure");
                    return Err(e);
                }
                if attempt >= max_attempts {
                    tracing::warn!(attempt, error = %e, "giving up after final attempt");
                    return Err(e);
                }
                let delay = backoff(attempt, &e);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ── Oracle back-off schedule ──────────────────────────────────────────────────

/// Delay before retrying an oracle call, jitter included.
///
/// Rate-limit failures back off from 5 s up to 5 min, and never wait less
/// than four times the server's own hint. Everything else grows by 1.5x
/// per attempt up to 30 s.
pub fn oracle_backoff(attempt: u32, err: &EtlError) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter = if err.is_rate_limited() {
        rng.gen_range(0.0..1.0)
    } else {
        rng.gen_range(0.0..0.25)
    };
    Duration::from_secs_f64(backoff_base_secs(attempt, err) + jitter)
}

/// The deterministic part of [`oracle_backoff`], in seconds.
pub fn backoff_base_secs(attempt: u32, err: &EtlError) -> f64 {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    if err.is_rate_limited() {
        let scheduled = (RATE_LIMIT_BASE_SECS * 2f64.powi(exponent)).min(RATE_LIMIT_CAP_SECS);
        let hinted = err
            .retry_after()
            .map(|d| d.as_secs_f64() * HINT_MULTIPLIER)
            .unwrap_or(0.0);
        scheduled.max(hinted)
    } else {
        1.5f64.powi(attempt.min(32) as i32).min(TRANSIENT_CAP_SECS)
    }
}

/// Extract a `try again in 225ms` / `try again in 2s` hint from an error body.
pub fn parse_retry_after_hint(text: &str) -> Option<Duration> {
    let caps = RETRY_HINT_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let secs = if caps.get(2)?.as_str().eq_ignore_ascii_case("ms") {
        value / 1000.0
    } else {
        value
    };
    Some(Duration::from_secs_f64(secs))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
