//! Token bucket arithmetic
//!
//! One function, [`consume`], holds the whole read-refill-compare step. The
//! in-memory store calls it under its lock and the Redis Lua script mirrors it
//! line for line, so both stores make identical decisions for identical input.

use gatekeeper_types::RateConfig;

/// Result of one check-and-consume step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumeOutcome {
    pub allowed: bool,
    /// Tokens left after the step: post-consume when allowed, post-refill when denied
    pub remaining: f64,
}

/// Bucket state to persist after an admitted request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketWrite {
    pub tokens: f64,
    pub last_refreshed: f64,
}

/// Refill the bucket up to `now` and try to take `cost` tokens.
///
/// Absent `tokens` means a full bucket; absent `last_refreshed` means 0.
/// Returns the write to apply, which is `None` on denial: a denied request
/// neither consumes tokens nor advances the refresh timestamp.
pub fn consume(
    tokens: Option<f64>,
    last_refreshed: Option<f64>,
    config: &RateConfig,
    now: f64,
    cost: f64,
) -> (ConsumeOutcome, Option<BucketWrite>) {
    let last_tokens = tokens.unwrap_or(config.capacity);
    let last_refreshed = last_refreshed.unwrap_or(0.0);

    let elapsed = (now - last_refreshed).max(0.0);
    let refilled = config
        .capacity
        .min(last_tokens + elapsed * config.refill_rate);

    if refilled >= cost {
        let remaining = refilled - cost;
        (
            ConsumeOutcome {
                allowed: true,
                remaining,
            },
            Some(BucketWrite {
                tokens: remaining,
                last_refreshed: now,
            }),
        )
    } else {
        (
            ConsumeOutcome {
                allowed: false,
                remaining: refilled,
            },
            None,
        )
    }
}

/// Seconds until `cost` tokens are available, given `remaining` tokens now
///
/// Rounded up so that waiting exactly this long is always enough; at least 1.
pub fn retry_after_secs(remaining: f64, cost: f64, refill_rate: f64) -> u64 {
    let wait = ((cost - remaining) / refill_rate).ceil();
    if wait.is_finite() && wait >= 1.0 {
        wait as u64
    } else {
        1
    }
}
