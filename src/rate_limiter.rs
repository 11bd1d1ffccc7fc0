use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::algorithms::{AlgorithmKind, Decision, RateLimitAlgorithm};
use crate::clock::{Clock, SystemClock};
use crate::rate_limit_config::LimiterSettings;
use crate::token_bucket::TokenBucket;

/// Token bucket limiter keyed by client identity.
///
/// A single mutex guards the whole map. Every operation is O(1) under the
/// lock except the idle sweep, and nothing awaits while holding it.
pub struct TokenBucketLimiter<C: Clock = SystemClock> {
    settings: LimiterSettings,
    buckets: Mutex<HashMap<String, TokenBucket>>,
    clock: C,
}

impl TokenBucketLimiter {
    pub fn new(settings: LimiterSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> TokenBucketLimiter<C> {
    pub fn with_clock(settings: LimiterSettings, clock: C) -> Self {
        Self {
            settings,
            buckets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    // Bucket updates are never left half-applied, so a poisoned map is
    // still consistent.
    fn buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether `key` may perform an action, consuming a token if so.
    pub fn allow(&self, key: &str) -> bool {
        let mut buckets = self.buckets();
        let now = self.clock.now();
        self.admit(&mut buckets, key, now)
    }

    /// Admission plus the key's remaining tokens and wait, under one lock.
    pub fn check(&self, key: &str) -> Decision {
        let mut buckets = self.buckets();
        let now = self.clock.now();
        let allowed = self.admit(&mut buckets, key, now);
        let (remaining, retry_after) = match buckets.get(key) {
            Some(bucket) => self.state_of(bucket, now),
            None => (self.settings.max_tokens, Duration::ZERO),
        };
        Decision {
            allowed,
            remaining,
            retry_after,
        }
    }

    /// Tokens available to `key` right now. Unseen keys have a full bucket.
    pub fn remaining_tokens(&self, key: &str) -> u64 {
        let buckets = self.buckets();
        match buckets.get(key) {
            Some(bucket) => bucket.projected_tokens(&self.settings, self.clock.now()),
            None => self.settings.max_tokens,
        }
    }

    /// Time until `key` can be admitted again.
    pub fn next_available(&self, key: &str) -> Duration {
        let buckets = self.buckets();
        match buckets.get(key) {
            Some(bucket) => self.state_of(bucket, self.clock.now()).1,
            None => Duration::ZERO,
        }
    }

    fn admit(&self, buckets: &mut HashMap<String, TokenBucket>, key: &str, now: Instant) -> bool {
        let Some(bucket) = buckets.get_mut(key) else {
            buckets.insert(key.to_string(), TokenBucket::first_use(&self.settings, now));
            return true;
        };

        bucket.touch(now);
        bucket.refill(&self.settings, now);
        bucket.try_consume()
    }

    fn state_of(&self, bucket: &TokenBucket, now: Instant) -> (u64, Duration) {
        let remaining = bucket.projected_tokens(&self.settings, now);
        if remaining > 0 {
            (remaining, Duration::ZERO)
        } else {
            (0, bucket.time_until_refill(&self.settings, now))
        }
    }

    /// Remove buckets not seen within the idle eviction threshold.
    pub fn evict_idle(&self) -> usize {
        let mut buckets = self.buckets();
        let now = self.clock.now();
        let before = buckets.len();
        let threshold = self.settings.idle_eviction;
        buckets.retain(|_, bucket| !bucket.is_idle(threshold, now));
        before - buckets.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets().len()
    }
}

impl<C: Clock> RateLimitAlgorithm for TokenBucketLimiter<C> {
    fn allow(&self, key: &str) -> bool {
        Self::allow(self, key)
    }

    fn check(&self, key: &str) -> Decision {
        Self::check(self, key)
    }

    fn remaining_tokens(&self, key: &str) -> u64 {
        Self::remaining_tokens(self, key)
    }

    fn next_available(&self, key: &str) -> Duration {
        Self::next_available(self, key)
    }

    fn evict_idle(&self) -> usize {
        Self::evict_idle(self)
    }

    fn tracked_keys(&self) -> usize {
        Self::tracked_keys(self)
    }

    fn limit(&self) -> u64 {
        self.settings.max_tokens
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::TokenBucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn limiter(rate: u64, interval: Duration, max_tokens: u64) -> (TokenBucketLimiter<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let settings = LimiterSettings::new(rate, interval, max_tokens, Duration::from_secs(3600))
            .unwrap();
        (TokenBucketLimiter::with_clock(settings, clock.clone()), clock)
    }

    #[test]
    fn test_burst_capacity() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(1), 10);
        for _ in 0..10 {
            assert!(limiter.allow("client"));
        }
        assert!(!limiter.allow("client"));
    }

    #[test]
    fn test_refill_after_interval() {
        let (limiter, clock) = limiter(3, Duration::from_secs(1), 10);
        while limiter.allow("client") {}

        clock.advance(Duration::from_secs(1));
        for _ in 0..3 {
            assert!(limiter.allow("client"));
        }
        assert!(!limiter.allow("client"));
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let (limiter, clock) = limiter(10, Duration::from_secs(1), 4);
        while limiter.allow("client") {}

        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.remaining_tokens("client"), 4);
        for _ in 0..4 {
            assert!(limiter.allow("client"));
        }
        assert!(!limiter.allow("client"));
    }

    #[test]
    fn test_unseen_key_is_full() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(1), 7);
        assert_eq!(limiter.remaining_tokens("nobody"), 7);
        assert_eq!(limiter.next_available("nobody"), Duration::ZERO);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_denial_is_idempotent_without_time() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(1), 2);
        assert!(limiter.allow("client"));
        assert!(limiter.allow("client"));
        for _ in 0..20 {
            assert!(!limiter.allow("client"));
        }
        assert_eq!(limiter.remaining_tokens("client"), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(1), 1);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[test]
    fn test_example_scenario() {
        let (limiter, clock) = limiter(1, Duration::from_secs(1), 5);
        for _ in 0..5 {
            assert!(limiter.allow("a"));
        }
        assert!(!limiter.allow("a"));

        clock.advance(Duration::from_secs(1));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn test_remaining_tokens_is_a_projection() {
        let (limiter, clock) = limiter(1, Duration::from_secs(1), 5);
        while limiter.allow("a") {}

        clock.advance(Duration::from_millis(2500));
        assert_eq!(limiter.remaining_tokens("a"), 2);
        assert_eq!(limiter.remaining_tokens("a"), 2);

        // Half a second already carried toward the third interval.
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        clock.advance(Duration::from_millis(500));
        assert_eq!(limiter.remaining_tokens("a"), 1);
    }

    #[test]
    fn test_next_available() {
        let (limiter, clock) = limiter(1, Duration::from_secs(1), 1);
        assert!(limiter.allow("a"));
        assert_eq!(limiter.next_available("a"), Duration::from_secs(1));

        clock.advance(Duration::from_millis(300));
        assert_eq!(limiter.next_available("a"), Duration::from_millis(700));

        clock.advance(Duration::from_millis(700));
        assert_eq!(limiter.next_available("a"), Duration::ZERO);
    }

    #[test]
    fn test_next_available_zero_while_tokens_left() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(1), 3);
        assert!(limiter.allow("a"));
        assert_eq!(limiter.next_available("a"), Duration::ZERO);
    }

    #[test]
    fn test_check_reports_state_of_its_own_decision() {
        let (limiter, clock) = limiter(1, Duration::from_secs(1), 2);

        let first = limiter.check("a");
        assert_eq!(
            first,
            Decision {
                allowed: true,
                remaining: 1,
                retry_after: Duration::ZERO
            }
        );

        let second = limiter.check("a");
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert_eq!(second.retry_after, Duration::from_secs(1));

        clock.advance(Duration::from_millis(400));
        let denied = limiter.check("a");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after, Duration::from_millis(600));
    }

    #[test]
    fn test_idle_eviction_resets_key() {
        let clock = ManualClock::new();
        let settings =
            LimiterSettings::new(1, Duration::from_secs(1), 3, Duration::from_secs(60)).unwrap();
        let limiter = TokenBucketLimiter::with_clock(settings, clock.clone());

        while limiter.allow("idle") {}
        clock.advance(Duration::from_secs(30));
        assert!(limiter.allow("busy"));

        clock.advance(Duration::from_secs(31));
        assert_eq!(limiter.evict_idle(), 1);
        assert_eq!(limiter.tracked_keys(), 1);

        // Re-seen after eviction: full bucket minus one.
        assert!(limiter.allow("idle"));
        assert_eq!(limiter.remaining_tokens("idle"), 2);
    }

    #[test]
    fn test_eviction_uses_last_seen_not_last_refill() {
        let clock = ManualClock::new();
        let settings =
            LimiterSettings::new(1, Duration::from_secs(3600), 1, Duration::from_secs(60)).unwrap();
        let limiter = TokenBucketLimiter::with_clock(settings, clock.clone());

        assert!(limiter.allow("a"));
        for _ in 0..5 {
            clock.advance(Duration::from_secs(50));
            assert!(!limiter.allow("a"));
            assert_eq!(limiter.evict_idle(), 0);
        }
    }

    #[test]
    fn test_concurrent_callers_never_over_admit() {
        const CALLERS: usize = 16;
        const CALLS_EACH: usize = 50;

        let clock = ManualClock::new();
        let settings =
            LimiterSettings::new(1, Duration::from_secs(60), 100, Duration::from_secs(3600)).unwrap();
        let limiter = Arc::new(TokenBucketLimiter::with_clock(settings, clock));
        let admitted = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..CALLS_EACH {
                        if limiter.allow("shared") {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 100);
        assert_eq!(limiter.remaining_tokens("shared"), 0);
    }
}
