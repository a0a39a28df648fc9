//! # Rate Limiting
//!
//! Per-client request limiting with bounded memory.
//!
//! [`RateLimiter`] keeps one [`RollingCounter`] per client key (the client IP)
//! in a fixed-capacity LRU cache. A counter approximates a sliding window
//! with a handful of sub-window bins instead of storing a timestamp per
//! request, so memory per key is constant and the total is bounded by the
//! cache capacity no matter how many distinct clients connect.
//!
//! ```rust
//! use routegate::ratelimit::RateLimiter;
//! use std::num::NonZeroUsize;
//!
//! let limiter = RateLimiter::new(5, 60_000, NonZeroUsize::new(2).unwrap());
//! for _ in 0..5 {
//!     assert!(!limiter.check("10.0.0.1").is_blocked());
//! }
//! assert!(limiter.check("10.0.0.1").is_blocked());
//! ```

mod counter;
mod limiter;

pub use counter::RollingCounter;
pub use limiter::{
    RateDecision, RateLimiter, DEFAULT_BINS, DEFAULT_CAPACITY, DEFAULT_INTERVAL_MS, DEFAULT_LIMIT,
};
