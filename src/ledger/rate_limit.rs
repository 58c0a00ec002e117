//! Soft per-user tap throttle.
//!
//! State is process-local: it is lost on restart and not shared between
//! instances. The durable daily quota remains the hard limit.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;

use super::EconomyError;
use crate::{models::users::UserId, settings};

#[derive(Debug, Default)]
struct TapWindow {
    accepted: VecDeque<Instant>,
}

#[derive(Clone)]
pub struct TapRateLimiter {
    entries: Arc<DashMap<UserId, TapWindow>>,
    min_interval: Duration,
    max_per_window: usize,
    window: Duration,
    idle_ttl: Duration,
}

impl TapRateLimiter {
    pub fn new(
        min_interval: Duration,
        max_per_window: usize,
        window: Duration,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            min_interval,
            max_per_window,
            window,
            idle_ttl,
        }
    }

    pub fn from_settings(throttle: &settings::TapThrottle) -> Self {
        Self::new(
            Duration::from_millis(throttle.min_interval_ms),
            throttle.max_per_window,
            Duration::from_millis(throttle.window_ms),
            Duration::from_secs(throttle.idle_ttl_secs),
        )
    }

    pub fn check(&self, user_id: UserId) -> Result<(), EconomyError> {
        self.check_at(user_id, Instant::now())
    }

    /// Accepts the tap only if `min_interval` passed since the last accepted
    /// tap and fewer than `max_per_window` taps were accepted in the trailing
    /// window. Accepted taps are recorded; rejected ones are not.
    ///
    /// A recorded tap keeps counting even if the claim it guards fails later.
    pub fn check_at(&self, user_id: UserId, now: Instant) -> Result<(), EconomyError> {
        let mut entry = self.entries.entry(user_id).or_default();
        let taps = &mut entry.accepted;

        if let Some(last) = taps.back() {
            if now.saturating_duration_since(*last) < self.min_interval {
                return Err(EconomyError::RateLimited("Tapping too fast".to_string()));
            }
        }

        while let Some(first) = taps.front() {
            if now.saturating_duration_since(*first) >= self.window {
                taps.pop_front();
            } else {
                break;
            }
        }

        if taps.len() >= self.max_per_window {
            return Err(EconomyError::RateLimited("Tap rate exceeded".to_string()));
        }

        taps.push_back(now);
        Ok(())
    }

    /// Drops users whose last accepted tap is older than the idle TTL.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, window| match window.accepted.back() {
            Some(last) => now.saturating_duration_since(*last) < self.idle_ttl,
            None => false,
        });

        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_users(&self) -> usize {
        self.entries.len()
    }

    pub fn start_eviction_task(&self, every: Duration) {
        let limiter = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                let evicted = limiter.evict_idle(Instant::now());
                if evicted > 0 {
                    log::debug!(
                        "Evicted {} idle tap windows, {} tracked.",
                        evicted,
                        limiter.tracked_users()
                    );
                }
            }
        });

        log::info!("Tap limiter eviction task started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn default_limiter() -> TapRateLimiter {
        TapRateLimiter::from_settings(&settings::TapThrottle::default())
    }

    #[test]
    fn test_sixth_tap_within_a_second_is_rejected() {
        let limiter = TapRateLimiter::new(Duration::ZERO, 5, ms(1000), ms(60_000));
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.check_at(7, start + ms(i * 150)).is_ok());
        }

        let sixth = limiter.check_at(7, start + ms(900));
        assert!(matches!(sixth, Err(EconomyError::RateLimited(_))));
    }

    #[test]
    fn test_window_slides() {
        let limiter = TapRateLimiter::new(Duration::ZERO, 5, ms(1000), ms(60_000));
        let start = Instant::now();

        for i in 0..5 {
            limiter.check_at(7, start + ms(i * 100)).unwrap();
        }
        assert!(limiter.check_at(7, start + ms(999)).is_err());

        // The first tap has left the window.
        assert!(limiter.check_at(7, start + ms(1000)).is_ok());
    }

    #[test]
    fn test_minimum_interval_between_taps() {
        let limiter = default_limiter();
        let start = Instant::now();

        limiter.check_at(7, start).unwrap();
        assert!(limiter.check_at(7, start + ms(249)).is_err());
        assert!(limiter.check_at(7, start + ms(250)).is_ok());
    }

    #[test]
    fn test_default_limits_reject_six_taps_in_one_second() {
        let limiter = default_limiter();
        let start = Instant::now();

        let accepted = (0..6)
            .filter(|i| limiter.check_at(7, start + ms(i * 199)).is_ok())
            .count();

        assert!(accepted < 6);
        assert!(limiter.check_at(7, start + ms(999)).is_err());
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = default_limiter();
        let now = Instant::now();

        limiter.check_at(1, now).unwrap();
        assert!(limiter.check_at(2, now).is_ok());
    }

    #[test]
    fn test_idle_entries_are_evicted() {
        let limiter = TapRateLimiter::new(ms(250), 5, ms(1000), ms(5_000));
        let start = Instant::now();

        limiter.check_at(1, start).unwrap();
        limiter.check_at(2, start + ms(4_000)).unwrap();

        assert_eq!(limiter.evict_idle(start + ms(6_000)), 1);
        assert_eq!(limiter.tracked_users(), 1);
    }
}
