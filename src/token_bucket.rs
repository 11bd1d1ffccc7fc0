use std::time::{Duration, Instant};

use crate::rate_limit_config::LimiterSettings;

/// Per-key token bucket state.
///
/// Refill is lazy: nothing ticks per key, tokens are credited on access for
/// every whole `interval` elapsed since `last_refill`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: u64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    /// Bucket for a key seen for the first time at `now`: full, with the
    /// current request's token already taken.
    pub fn first_use(settings: &LimiterSettings, now: Instant) -> Self {
        Self {
            tokens: settings.max_tokens.saturating_sub(1),
            last_refill: now,
            last_seen: now,
        }
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Credit whole elapsed intervals. `last_refill` moves by exactly that
    /// many intervals so the partial remainder counts toward the next one.
    pub fn refill(&mut self, settings: &LimiterSettings, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let (intervals, remainder) = whole_intervals(elapsed, settings.interval);
        if intervals == 0 {
            return;
        }

        self.tokens = self
            .tokens
            .saturating_add(intervals.saturating_mul(settings.rate))
            .min(settings.max_tokens);
        self.last_refill = now.checked_sub(remainder).unwrap_or(now);
    }

    /// Token count a refill at `now` would produce, without applying it.
    pub fn projected_tokens(&self, settings: &LimiterSettings, now: Instant) -> u64 {
        let mut projected = self.clone();
        projected.refill(settings, now);
        projected.tokens
    }

    pub fn try_consume(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Time left until the next interval boundary counted from `last_refill`.
    pub fn time_until_refill(&self, settings: &LimiterSettings, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let (_, remainder) = whole_intervals(elapsed, settings.interval);
        settings.interval - remainder
    }

    pub fn is_idle(&self, threshold: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > threshold
    }
}

/// Split `elapsed` into whole `interval`s and the leftover.
fn whole_intervals(elapsed: Duration, interval: Duration) -> (u64, Duration) {
    let interval_nanos = interval.as_nanos();
    if interval_nanos == 0 {
        return (0, Duration::ZERO);
    }
    let elapsed_nanos = elapsed.as_nanos();
    let count = u64::try_from(elapsed_nanos / interval_nanos).unwrap_or(u64::MAX);
    // Remainder is below `interval`, which itself fits in a Duration.
    let remainder = elapsed_nanos % interval_nanos;
    let remainder = Duration::new(
        (remainder / 1_000_000_000) as u64,
        (remainder % 1_000_000_000) as u32,
    );
    (count, remainder)
}
