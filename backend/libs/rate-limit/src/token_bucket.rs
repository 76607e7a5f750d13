//! Token bucket primitive
//!
//! Refill is computed lazily on access, so no background timer is needed.
//! Each bucket carries its own lock; contention on one caller's bucket never
//! blocks another caller's request.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::Decision;

/// Fallback retry hint when a bucket has no refill (capacity-only budgets).
const NO_REFILL_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single-resource token bucket.
///
/// The token count is fractional so slow refill rates accumulate smoothly.
/// It is always clamped to `[0, capacity]`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity.max(0.0),
            refill_per_sec: refill_per_sec.max(0.0),
            state: Mutex::new(BucketState {
                tokens: capacity.max(0.0),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> Decision {
        self.try_acquire_at(Instant::now())
    }

    /// How long this bucket has gone without a refill/consume.
    ///
    /// Used by the idle-eviction pass; a bucket that has not been touched in a
    /// while can be dropped and lazily recreated on the next request.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(state.last_refill)
    }

    pub(crate) fn try_acquire_at(&self, now: Instant) -> Decision {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Decision::allowed()
        } else {
            let retry_after = if self.refill_per_sec > 0.0 {
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            } else {
                NO_REFILL_RETRY_AFTER
            };
            Decision::rejected(retry_after)
        }
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_up_to_capacity_then_reject() {
        let bucket = TokenBucket::new(2.0, 0.0);
        let now = Instant::now();

        assert!(bucket.try_acquire_at(now).allowed);
        assert!(bucket.try_acquire_at(now).allowed);

        let rejected = bucket.try_acquire_at(now);
        assert!(!rejected.allowed);
        assert!(rejected.retry_after > Duration::ZERO);
    }

    #[test]
    fn refill_grants_exactly_one_token_after_one_period() {
        // capacity 5, 2 tokens/sec => one token every 500ms
        let bucket = TokenBucket::new(5.0, 2.0);
        let start = Instant::now();

        for _ in 0..5 {
            assert!(bucket.try_acquire_at(start).allowed);
        }
        assert!(!bucket.try_acquire_at(start).allowed);

        let later = start + Duration::from_millis(500);
        assert!(bucket.try_acquire_at(later).allowed);
        assert!(!bucket.try_acquire_at(later).allowed);
    }

    #[test]
    fn count_never_exceeds_capacity_or_goes_negative() {
        let bucket = TokenBucket::new(3.0, 10.0);
        let start = Instant::now();

        // Long idle period must clamp at capacity, not accumulate past it.
        let after_idle = start + Duration::from_secs(3600);
        for _ in 0..3 {
            assert!(bucket.try_acquire_at(after_idle).allowed);
        }
        assert!(!bucket.try_acquire_at(after_idle).allowed);
        assert!(bucket.tokens() >= 0.0);
        assert!(bucket.tokens() <= 3.0);
    }

    #[test]
    fn retry_after_reflects_refill_rate() {
        let bucket = TokenBucket::new(1.0, 0.5);
        let now = Instant::now();

        assert!(bucket.try_acquire_at(now).allowed);
        let rejected = bucket.try_acquire_at(now);
        assert!(!rejected.allowed);
        // One token takes two seconds at 0.5 tokens/sec.
        assert!(rejected.retry_after >= Duration::from_secs(1));
        assert!(rejected.retry_after <= Duration::from_secs(3));
    }

    #[test]
    fn zero_refill_reports_fallback_retry_hint() {
        let bucket = TokenBucket::new(1.0, 0.0);
        let now = Instant::now();

        assert!(bucket.try_acquire_at(now).allowed);
        let rejected = bucket.try_acquire_at(now);
        assert_eq!(rejected.retry_after, NO_REFILL_RETRY_AFTER);
    }

    #[test]
    fn idle_for_tracks_last_touch() {
        let bucket = TokenBucket::new(1.0, 1.0);
        let start = Instant::now();
        bucket.try_acquire_at(start);

        assert!(bucket.idle_for(start + Duration::from_secs(30)) >= Duration::from_secs(30));
    }
}
