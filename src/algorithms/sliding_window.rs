//! Sliding window rate limiting algorithm
//!
//! Keeps the admission times of each key and admits a request only while
//! fewer than `max_requests` of them fall inside the trailing `window`.
//! Denied requests are not recorded. Unlike the token bucket there is no
//! burst-then-sustained behaviour: the cap is strict per window.
//!
//! The window is closed at both ends: an entry admitted at `t` still counts
//! at exactly `t + window` and ages out just after it.

use super::{AlgorithmKind, Decision, RateLimitAlgorithm};
use crate::clock::{Clock, SystemClock};
use crate::rate_limit_config::WindowSettings;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Smallest step past the window edge, so a wait of this length lands on the
/// first instant the oldest entry no longer counts.
const EDGE: Duration = Duration::from_nanos(1);

/// Sliding window rate limiter implementation
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    settings: WindowSettings,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    clock: C,
}

impl SlidingWindowLimiter {
    pub fn new(settings: WindowSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    pub fn with_clock(settings: WindowSettings, clock: C) -> Self {
        Self {
            settings,
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, admitted: Instant, now: Instant) -> bool {
        now.saturating_duration_since(admitted) <= self.settings.window
    }

    fn prune(&self, times: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = times.front() {
            if self.is_live(*oldest, now) {
                break;
            }
            times.pop_front();
        }
    }

    fn admit(&self, times: &mut VecDeque<Instant>, now: Instant) -> bool {
        self.prune(times, now);
        if times.len() as u64 >= self.settings.max_requests {
            return false;
        }
        times.push_back(now);
        true
    }

    /// Remaining quota and wait for `times` at `now`, without pruning.
    fn state_of(&self, times: &VecDeque<Instant>, now: Instant) -> (u64, Duration) {
        let oldest = times.iter().find(|t| self.is_live(**t, now)).copied();
        let used = times.iter().filter(|t| self.is_live(**t, now)).count() as u64;

        if used < self.settings.max_requests {
            return (self.settings.max_requests - used, Duration::ZERO);
        }

        // At the quota: wait for the oldest live entry to age out.
        let wait = oldest
            .map(|oldest| (oldest + self.settings.window).saturating_duration_since(now) + EDGE)
            .unwrap_or(Duration::ZERO);
        (0, wait)
    }
}

impl<C: Clock> RateLimitAlgorithm for SlidingWindowLimiter<C> {
    fn allow(&self, key: &str) -> bool {
        let mut windows = self.windows();
        let now = self.clock.now();
        self.admit(windows.entry(key.to_string()).or_default(), now)
    }

    fn check(&self, key: &str) -> Decision {
        let mut windows = self.windows();
        let now = self.clock.now();
        let times = windows.entry(key.to_string()).or_default();
        let allowed = self.admit(times, now);
        let (remaining, retry_after) = self.state_of(times, now);
        Decision {
            allowed,
            remaining,
            retry_after,
        }
    }

    fn remaining_tokens(&self, key: &str) -> u64 {
        let windows = self.windows();
        match windows.get(key) {
            Some(times) => self.state_of(times, self.clock.now()).0,
            None => self.settings.max_requests,
        }
    }

    fn next_available(&self, key: &str) -> Duration {
        let windows = self.windows();
        match windows.get(key) {
            Some(times) => self.state_of(times, self.clock.now()).1,
            None => Duration::ZERO,
        }
    }

    fn evict_idle(&self) -> usize {
        let mut windows = self.windows();
        let now = self.clock.now();
        let before = windows.len();
        let threshold = self.settings.idle_eviction;
        windows.retain(|_, times| match times.back() {
            Some(newest) => now.saturating_duration_since(*newest) <= threshold,
            None => false,
        });
        before - windows.len()
    }

    fn tracked_keys(&self) -> usize {
        self.windows().len()
    }

    fn limit(&self) -> u64 {
        self.settings.max_requests
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::SlidingWindow
    }
}
