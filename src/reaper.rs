//! Background reclamation of idle limiter state.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::algorithms::RateLimitAlgorithm;

/// Handle to the periodic sweep task. Dropping it stops the task.
pub struct Reaper {
    shutdown_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Spawn a task that calls [`RateLimitAlgorithm::evict_idle`] every
    /// `period`. Must be called from within a tokio runtime.
    pub fn spawn(limiter: Arc<dyn RateLimitAlgorithm>, period: Duration) -> Self {
        let shutdown_token = CancellationToken::new();
        let token = shutdown_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; sweeps start one period in.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(target: "linkthrottle::reaper", "Reaper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = limiter.evict_idle();
                        debug!(
                            target: "linkthrottle::reaper",
                            evicted,
                            tracked = limiter.tracked_keys(),
                            "Idle sweep finished"
                        );
                    }
                }
            }
        });

        info!(target: "linkthrottle::reaper", period = ?period, "Idle key reaper started");

        Self {
            shutdown_token,
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(target: "linkthrottle::reaper", error = %e, "Reaper task ended abnormally");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit_config::LimiterSettings;
    use crate::rate_limiter::TokenBucketLimiter;

    fn limiter(clock: &ManualClock) -> Arc<TokenBucketLimiter<ManualClock>> {
        let settings =
            LimiterSettings::new(1, Duration::from_secs(1), 5, Duration::from_secs(60)).unwrap();
        Arc::new(TokenBucketLimiter::with_clock(settings, clock.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_sweeps_on_its_own_timer() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);
        assert!(limiter.allow("stale"));
        assert!(limiter.allow("fresh"));

        let reaper = Reaper::spawn(limiter.clone(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(limiter.tracked_keys(), 0);

        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_keeps_active_keys() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);
        let reaper = Reaper::spawn(limiter.clone(), Duration::from_secs(10));

        for _ in 0..5 {
            assert!(limiter.allow("active"));
            clock.advance(Duration::from_secs(30));
            tokio::time::sleep(Duration::from_secs(10)).await;
            assert_eq!(limiter.tracked_keys(), 1);
        }

        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeping() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);
        let reaper = Reaper::spawn(limiter.clone(), Duration::from_secs(10));
        reaper.shutdown().await;

        assert!(limiter.allow("late"));
        clock.advance(Duration::from_secs(120));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);
        let reaper = Reaper::spawn(limiter.clone(), Duration::from_secs(10));
        let token = reaper.shutdown_token.clone();
        drop(reaper);
        assert!(token.is_cancelled());
    }
}
