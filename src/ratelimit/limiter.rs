use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use super::counter::{now_ms, RollingCounter};
use crate::config::RateLimitConfig;
use crate::error::ConfigError;

/// Requests allowed per window unless configured otherwise.
pub const DEFAULT_LIMIT: u64 = 5;
/// Window length in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 60 * 1000;
/// Distinct client keys tracked at once.
pub const DEFAULT_CAPACITY: usize = 1024;
/// Sub-window bins per key.
pub const DEFAULT_BINS: usize = 4;

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { count: u64 },
    Blocked { count: u64 },
}

impl RateDecision {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, RateDecision::Blocked { .. })
    }

    /// Windowed request count including this one.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            RateDecision::Allowed { count } | RateDecision::Blocked { count } => *count,
        }
    }
}

/// Per-key request limiter with bounded memory.
///
/// Each key gets a [`RollingCounter`]. Counters live in an LRU cache of fixed
/// capacity: every check promotes its key, and a new key beyond capacity
/// evicts the least recently used one, whose history is lost. An evicted key
/// restarts from zero, so eviction can only make the limiter more lenient.
///
/// One mutex guards the whole cache; the increment, the comparison and the
/// LRU reordering happen under the same lock.
pub struct RateLimiter {
    limit: u64,
    interval_ms: u64,
    bins: usize,
    counters: Mutex<LruCache<String, RollingCounter>>,
}

impl RateLimiter {
    /// Limiter with [`DEFAULT_BINS`] bins per key.
    #[must_use]
    pub fn new(limit: u64, interval_ms: u64, capacity: NonZeroUsize) -> Self {
        Self::with_bins(limit, interval_ms, capacity, DEFAULT_BINS)
    }

    #[must_use]
    pub fn with_bins(limit: u64, interval_ms: u64, capacity: NonZeroUsize, bins: usize) -> Self {
        Self {
            limit,
            interval_ms,
            bins: bins.max(1),
            counters: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration fails validation.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.capacity)
            .ok_or_else(|| ConfigError::Invalid("rate_limit.capacity must be > 0".into()))?;
        Ok(Self::with_bins(
            config.limit,
            config.interval_ms,
            capacity,
            config.bins,
        ))
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, RollingCounter>> {
        // Counters are plain integers; a panic elsewhere cannot leave one half-updated.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a request from `key` now.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, now_ms())
    }

    /// Count a request from `key` at `now_ms`. Blocked once the windowed count
    /// exceeds the limit.
    pub fn check_at(&self, key: &str, now_ms: u64) -> RateDecision {
        let mut counters = self.lock();

        let count = match counters.get_mut(key) {
            Some(counter) => counter.increment_at(now_ms),
            None => {
                let mut counter = RollingCounter::new(self.interval_ms, self.bins);
                let count = counter.increment_at(now_ms);
                if let Some((evicted, _)) = counters.push(key.to_string(), counter) {
                    debug!(evicted = %evicted, "Rate limiter evicted least recently used key");
                }
                count
            }
        };

        if count > self.limit {
            RateDecision::Blocked { count }
        } else {
            RateDecision::Allowed { count }
        }
    }

    /// Whether `key` currently has history. Does not promote the key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Windowed count of `key` as of its last request. Does not promote the key.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<u64> {
        self.lock().peek(key).map(RollingCounter::value)
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_LIMIT,
            DEFAULT_INTERVAL_MS,
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        )
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("interval_ms", &self.interval_ms)
            .field("bins", &self.bins)
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}
