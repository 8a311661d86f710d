//! Retry utilities for transient responder failures.
//!
//! Provides classification of retryable errors and exponential backoff
//! with jitter.

use crate::error::ResponderError;
use rand::Rng;
use std::time::Duration;

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Determine whether a responder error is worth retrying.
///
/// Retryable errors: timeouts, connect failures, rate limits (429), server
/// errors (5xx). Non-retryable: auth failures, bad requests, malformed
/// replies, missing files.
pub fn is_retryable(error: &ResponderError) -> bool {
    match error {
        ResponderError::Timeout { .. } | ResponderError::Connect { .. } => true,
        ResponderError::Http { status_code, .. } => {
            matches!(status_code, Some(code) if *code == 429 || (500..=599).contains(code))
        }
        ResponderError::Parse { .. } | ResponderError::Io { .. } | ResponderError::Job { .. } => {
            false
        }
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

/// Backoff with up to 25% random jitter added, still capped at 30 seconds.
///
/// Keeps retries from several responders hitting the same upstream in lockstep.
pub fn jittered_backoff(attempt: u32, base_delay_ms: u64) -> Duration {
    let base = backoff_duration(attempt, base_delay_ms).as_millis() as u64;
    let jitter = if base >= 4 {
        rand::thread_rng().gen_range(0..=base / 4)
    } else {
        0
    };
    Duration::from_millis((base + jitter).min(MAX_BACKOFF_MS))
}
