//! Retry policy for transient pipeline failures.
//!
//! Two delay schedules are used by the caption generator: exponential backoff
//! for rate-limited attempts and a short linear ramp for everything else. The
//! classifier decides dead-letter eligibility after in-call retries are
//! exhausted.

use std::time::Duration;

/// Base delay for rate-limit backoff.
const BASE_DELAY_MS: u64 = 2_000;

/// Backoff ceiling (5 minutes).
const MAX_DELAY_MS: u64 = 300_000;

/// Exponential backoff for rate-limited attempts:
/// `min(2000ms * 2^attempt, 300000ms)`.
pub fn backoff_delay(attempt: u32) -> Duration {
    let delay = BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_DELAY_MS))
}

/// Linear ramp for non-rate-limit failures: `1s * (attempt + 1)`.
pub fn linear_delay(attempt: u32) -> Duration {
    Duration::from_millis(1_000 * (u64::from(attempt) + 1))
}

/// Whether an error message describes a transient condition worth a
/// background retry: rate limiting, HTTP 429, timeouts, connection resets,
/// or generic network failures. Anything else is considered permanent for
/// dead-letter purposes.
pub fn is_retryable(message: &str) -> bool {
    let lower = message.to_lowercase();
    const PATTERNS: [&str; 6] = [
        "rate limit",
        "429",
        "timeout",
        "econnreset",
        "etimedout",
        "network",
    ];
    PATTERNS.iter().any(|pattern| lower.contains(pattern))
}
