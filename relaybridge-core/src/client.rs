//! Rate-limited outbound HTTP client primitives: a shared per-endpoint-family
//! token governor, retry-with-backoff, and cancellable line streaming.
//!
//! Grounded on `ferrex-core::auth::rate_limit` (`RateLimitAlgorithm`,
//! `RateLimitKey`, `RateLimitDecision` shape), generalized from incoming
//! per-IP/per-user limiting to outbound per-endpoint-family gating, and on
//! the teacher's workspace-wide `dashmap` dependency for the per-family
//! counters.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("response body was empty")]
    EmptyBody,

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Whether a failure should be retried by the governor (spec §4.A, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

impl ClientError {
    /// Network errors, timeouts, 408, 429, and 5xx are transient; any other
    /// 4xx fails fast (spec §4.A "Retry policy").
    pub fn classify(&self) -> FailureClass {
        match self {
            ClientError::Network(_) | ClientError::Timeout | ClientError::Server { .. } => {
                FailureClass::Transient
            }
            ClientError::Client { status, .. } if *status == 408 || *status == 429 => {
                FailureClass::Transient
            }
            ClientError::Client { .. }
            | ClientError::RetriesExhausted { .. }
            | ClientError::EmptyBody
            | ClientError::Cancelled => FailureClass::Permanent,
        }
    }
}

/// A 429 `Retry-After` header value, either form spec §4.A names.
#[derive(Debug, Clone, Copy)]
pub enum RetryAfter {
    Seconds(u64),
    HttpDate(DateTime<Utc>),
}

impl RetryAfter {
    fn as_duration(self) -> StdDuration {
        match self {
            RetryAfter::Seconds(s) => StdDuration::from_secs(s),
            RetryAfter::HttpDate(at) => {
                let delta = (at - Utc::now()).num_milliseconds().max(0);
                StdDuration::from_millis(delta as u64)
            }
        }
    }
}

struct FamilyState {
    min_spacing: StdDuration,
    concurrency: Arc<Semaphore>,
    last_call_at: std::sync::Mutex<Option<Instant>>,
    cooldown_until: std::sync::Mutex<Option<Instant>>,
}

/// Process-wide gate on outbound calls, one bucket per endpoint family
/// (e.g. `"plex:discover"`, `"sonarr:<instance-id>"`, `"tmdb"`). All
/// suspension happens inside the governor; callers never sleep directly
/// (spec §4.A).
pub struct RateGovernor {
    families: DashMap<String, Arc<FamilyState>>,
    default_min_spacing: StdDuration,
    default_concurrency: usize,
}

impl RateGovernor {
    pub fn new(default_min_spacing: StdDuration, default_concurrency: usize) -> Self {
        Self { families: DashMap::new(), default_min_spacing, default_concurrency }
    }

    fn family(&self, name: &str) -> Arc<FamilyState> {
        self.families
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(FamilyState {
                    min_spacing: self.default_min_spacing,
                    concurrency: Arc::new(Semaphore::new(self.default_concurrency)),
                    last_call_at: std::sync::Mutex::new(None),
                    cooldown_until: std::sync::Mutex::new(None),
                })
            })
            .clone()
    }

    /// Records a 429's `Retry-After` as a cooldown applied to every future
    /// call in `family` until it elapses.
    #[instrument(skip(self))]
    pub fn note_rate_limited(&self, family: &str, retry_after: RetryAfter) {
        let state = self.family(family);
        let until = Instant::now() + retry_after.as_duration();
        *state.cooldown_until.lock().unwrap() = Some(until);
        warn!(family, "endpoint family entered cooldown");
    }

    /// Blocks until `family` allows the next call, then returns a permit
    /// holding the concurrency slot for the call's duration.
    async fn acquire(&self, family: &str) -> OwnedPermitGuard {
        let state = self.family(family);
        loop {
            let cooldown = *state.cooldown_until.lock().unwrap();
            if let Some(until) = cooldown {
                if until > Instant::now() {
                    tokio::time::sleep_until(until).await;
                    continue;
                }
            }
            let last = *state.last_call_at.lock().unwrap();
            if let Some(last) = last {
                let earliest = last + state.min_spacing;
                if earliest > Instant::now() {
                    tokio::time::sleep_until(earliest).await;
                    continue;
                }
            }
            break;
        }
        let permit = state.concurrency.clone().acquire_owned().await.expect("semaphore never closed");
        *state.last_call_at.lock().unwrap() = Some(Instant::now());
        OwnedPermitGuard { _permit: permit }
    }
}

struct OwnedPermitGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Exponential backoff with jitter, capped at a configured ceiling and
/// attempt count (spec §4.A "Retry policy").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: StdDuration,
    pub max_delay: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: StdDuration::from_millis(200), max_delay: StdDuration::from_secs(30) }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> StdDuration {
        let exp = self.base_delay.saturating_mul(1 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::rng().random_range(0..=capped.as_millis().max(1) as u64 / 4);
        capped + StdDuration::from_millis(jitter_ms)
    }
}

/// Runs `call` under the governor's gating, retrying transient failures per
/// `policy`. `call` is invoked fresh on every attempt.
#[instrument(skip(governor, policy, call))]
pub async fn execute_with_retry<F, Fut, T>(
    governor: &RateGovernor,
    family: &str,
    policy: RetryPolicy,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let _permit = governor.acquire(family).await;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.classify() == FailureClass::Permanent {
                    return Err(err);
                }
                if let ClientError::Client { status: 429, .. } = &err {
                    governor.note_rate_limited(family, RetryAfter::Seconds(policy.base_delay.as_secs().max(1)));
                }
                attempt += 1;
                if attempt >= policy.max_attempts {
                    warn!(family, attempt, "retries exhausted");
                    return Err(ClientError::RetriesExhausted { attempts: attempt, last: err.to_string() });
                }
                let delay = policy.delay_for(attempt);
                debug!(family, attempt, ?delay, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// A lazy sequence of text lines from a plain or gzip-encoded body (spec
/// §4.A "Streaming helpers"); the concrete reqwest/gzip wiring is a caller
/// concern, this only defines the cancellable-iteration shape.
#[async_trait::async_trait]
pub trait LineStream: Send {
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Drains `stream` into lines, honoring a total timeout and an external
/// cancellation signal; raises [`ClientError::EmptyBody`] if nothing was
/// ever produced.
pub async fn read_lines_cancellable(
    mut stream: impl LineStream,
    total_timeout: StdDuration,
    mut cancel: tokio::sync::watch::Receiver<bool>,
) -> Result<Vec<String>> {
    let deadline = Instant::now() + total_timeout;
    let mut lines = Vec::new();
    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_ok() && *cancel.borrow() {
                    return Err(ClientError::Cancelled);
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                return Err(ClientError::Timeout);
            }
            line = stream.next_line() => {
                match line? {
                    Some(l) => lines.push(l),
                    None => break,
                }
            }
        }
    }
    if lines.is_empty() {
        return Err(ClientError::EmptyBody);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn classifies_transient_and_permanent() {
        assert_eq!(ClientError::Timeout.classify(), FailureClass::Transient);
        assert_eq!(
            ClientError::Client { status: 429, message: "".into() }.classify(),
            FailureClass::Transient
        );
        assert_eq!(
            ClientError::Client { status: 404, message: "".into() }.classify(),
            FailureClass::Permanent
        );
        assert_eq!(
            ClientError::Server { status: 503, message: "".into() }.classify(),
            FailureClass::Transient
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_pauses_family_for_at_least_retry_after() {
        let governor = RateGovernor::new(StdDuration::from_millis(0), 4);
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_attempts: 2, base_delay: StdDuration::from_millis(10), max_delay: StdDuration::from_secs(1) };

        let start = Instant::now();
        let result: Result<()> = execute_with_retry(&governor, "sonarr:1", policy, || {
            let calls = &calls;
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(ClientError::Client { status: 429, message: "slow down".into() })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(calls.load(Ordering::SeqCst) == 2);
        assert!(start.elapsed() >= StdDuration::from_millis(10));
    }

    #[tokio::test]
    async fn permanent_failure_never_retries() {
        let governor = RateGovernor::new(StdDuration::from_millis(0), 4);
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<()> = execute_with_retry(&governor, "sonarr:1", policy, || {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Client { status: 404, message: "missing".into() })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
