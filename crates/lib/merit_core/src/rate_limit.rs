//! Sliding-window rate limiter.
//!
//! Single-process, in-memory admission control keyed by arbitrary strings
//! (IP, user ID, user+permission composites). Distinct keys carry fully
//! independent budgets; a single request may be checked against several keys
//! and must pass all of them.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Process-wide sliding-window limiter.
///
/// One instance per process, shared via `Arc` and passed to whatever composes
/// the request pipeline. The raw map is never exposed.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request for `key`.
    ///
    /// Prunes timestamps older than `now - window`, then admits (recording
    /// `now`) iff fewer than `limit` admitted requests remain in the window.
    /// A rejection records nothing.
    pub fn allow(&self, key: &str, limit: usize, window: Duration) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let timestamps = windows.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < window);
        if timestamps.len() >= limit {
            return false;
        }
        timestamps.push(now);
        true
    }

    /// Drop keys whose entire history has aged past `retention`. Cadence is
    /// independent of any window length; the sweep only bounds memory.
    pub fn sweep(&self, retention: Duration) {
        let now = Instant::now();
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < retention);
                !timestamps.is_empty()
            });
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        for _ in 0..5 {
            assert!(limiter.allow("user:u1", 5, window));
        }
        assert!(!limiter.allow("user:u1", 5, window));
        // Rejections record nothing, so the budget stays exhausted but stable.
        assert!(!limiter.allow("user:u1", 5, window));
    }

    #[test]
    fn budget_recovers_after_window_elapses() {
        let limiter = RateLimiter::new();
        let window = Duration::from_millis(40);
        assert!(limiter.allow("ip:10.0.0.1", 1, window));
        assert!(!limiter.allow("ip:10.0.0.1", 1, window));
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.allow("ip:10.0.0.1", 1, window));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        assert!(limiter.allow("user:u1", 1, window));
        assert!(!limiter.allow("user:u1", 1, window));
        assert!(limiter.allow("user:u2", 1, window));
        assert!(limiter.allow("user:u1:perm:create_achievement", 1, window));
    }

    #[test]
    fn sweep_drops_fully_aged_keys() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("user:u1", 5, Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(30));
        limiter.sweep(Duration::from_millis(20));
        assert_eq!(limiter.key_count(), 0);
    }
}
