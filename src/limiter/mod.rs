//! Fixed-window rate limiting keyed by (client, action)
//!
//! Courtesy backpressure, not a security boundary: `allow` never blocks,
//! it only tells the caller to reject with a retryable error. Buckets are
//! purged opportunistically on every call so the map cannot grow without
//! bound.

use crate::config::RatePolicy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Extra bucket lifetime past the window end
const BUCKET_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    client: String,
    action: &'static str,
    window_index: u64,
}

#[derive(Debug)]
struct RateBucket {
    count: u32,
    expires_at_ms: u64,
}

/// In-process fixed-window rate limiter
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<BucketKey, RateBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `action` for `client` and report whether it
    /// stays within `policy`.
    pub fn allow(&self, client: &str, action: &'static str, policy: RatePolicy) -> bool {
        self.allow_at(now_ms(), client, action, policy)
    }

    fn allow_at(&self, now: u64, client: &str, action: &'static str, policy: RatePolicy) -> bool {
        let window_ms = policy.window_seconds * 1000;
        let key = BucketKey {
            client: client.to_string(),
            action,
            window_index: now / window_ms,
        };

        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            // A poisoned lock still yields a usable map.
            Err(poisoned) => poisoned.into_inner(),
        };

        let count = {
            let bucket = buckets.entry(key).or_insert_with(|| RateBucket {
                count: 0,
                expires_at_ms: now + window_ms + BUCKET_GRACE.as_millis() as u64,
            });
            bucket.count += 1;
            bucket.count
        };

        buckets.retain(|_, bucket| bucket.expires_at_ms > now);

        count <= policy.limit
    }

    /// Number of live buckets, for tests and diagnostics.
    pub fn bucket_count(&self) -> usize {
        self.buckets
            .lock()
            .map(|buckets| buckets.len())
            .unwrap_or(0)
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(limit: u32, window_seconds: u64) -> RatePolicy {
        RatePolicy {
            limit,
            window_seconds,
        }
    }

    #[test]
    fn test_sixth_call_in_window_rejected() {
        let limiter = RateLimiter::new();
        let p = policy(5, 10);
        let base = 1_000_000;

        for _ in 0..5 {
            assert!(limiter.allow_at(base, "10.0.0.1", "queue_join", p));
        }
        assert!(!limiter.allow_at(base + 1, "10.0.0.1", "queue_join", p));
    }

    #[test]
    fn test_next_window_allows_again() {
        let limiter = RateLimiter::new();
        let p = policy(5, 10);
        let base = 1_000_000;

        for _ in 0..6 {
            limiter.allow_at(base, "10.0.0.1", "queue_join", p);
        }

        // First call in the following window rolls over.
        assert!(limiter.allow_at(base + 10_000, "10.0.0.1", "queue_join", p));
    }

    #[test]
    fn test_clients_and_actions_are_independent() {
        let limiter = RateLimiter::new();
        let p = policy(1, 10);
        let base = 1_000_000;

        assert!(limiter.allow_at(base, "10.0.0.1", "skip", p));
        assert!(!limiter.allow_at(base, "10.0.0.1", "skip", p));
        assert!(limiter.allow_at(base, "10.0.0.2", "skip", p));
        assert!(limiter.allow_at(base, "10.0.0.1", "chat_text", p));
    }

    #[test]
    fn test_expired_buckets_are_purged() {
        let limiter = RateLimiter::new();
        let p = policy(5, 10);
        let base = 1_000_000;

        limiter.allow_at(base, "10.0.0.1", "queue_join", p);
        limiter.allow_at(base, "10.0.0.2", "queue_join", p);
        assert_eq!(limiter.bucket_count(), 2);

        // Both buckets expire 11s after creation; a later call sweeps them.
        limiter.allow_at(base + 12_000, "10.0.0.3", "queue_join", p);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_window_boundary_arithmetic() {
        let limiter = RateLimiter::new();
        let p = policy(1, 10);

        // 9_999ms and 10_000ms land in different windows.
        assert!(limiter.allow_at(9_999, "c", "a", p));
        assert!(limiter.allow_at(10_000, "c", "a", p));
        assert!(!limiter.allow_at(10_001, "c", "a", p));
    }
}
