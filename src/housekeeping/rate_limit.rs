//! Per-user request throttling
//!
//! Remembers when each user last talked to the bot. Entries live in memory
//! only and are pruned by the housekeeping sweep.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum gap between two requests of a non-staff user.
    pub min_interval: Duration,
    /// Entries older than this are removed by [`UserRateLimiter::sweep`].
    pub ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            ttl: Duration::from_secs(36 * 60 * 60),
        }
    }
}

/// Last-request timestamps keyed by user id
pub struct UserRateLimiter {
    config: RateLimitConfig,
    last_seen: Mutex<HashMap<i64, Instant>>,
}

impl UserRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<i64, Instant>> {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tell whether a request may proceed, recording it when it does.
    /// Staff are never throttled. Rejected requests leave the window untouched.
    pub fn check_and_record(&self, user_id: i64, is_staff: bool) -> bool {
        self.check_and_record_at(user_id, is_staff, Instant::now())
    }

    pub fn check_and_record_at(&self, user_id: i64, is_staff: bool, now: Instant) -> bool {
        let mut entries = self.entries();
        if !is_staff {
            if let Some(last) = entries.get(&user_id) {
                if now.saturating_duration_since(*last) < self.config.min_interval {
                    return false;
                }
            }
        }
        entries.insert(user_id, now);
        true
    }

    /// Remove entries older than `ttl`. Returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        self.sweep_at(Instant::now(), ttl)
    }

    /// Same as [`sweep`](Self::sweep) against an explicit clock reading.
    pub fn sweep_at(&self, now: Instant, ttl: Duration) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, last| now.saturating_duration_since(*last) <= ttl);
        before - entries.len()
    }

    /// Number of tracked users
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for UserRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
