//! # Router Configuration
//!
//! Settings that affect the dispatcher at runtime. Defaults match the
//! built-in behaviour, so an empty file, or no configuration at all, gives a
//! limit of 5 requests per 60 s per client IP, tracked for up to 1024 clients.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `ROUTEGATE_RATE_LIMIT` | `rate_limit.limit` | `5` |
//! | `ROUTEGATE_RATE_INTERVAL_MS` | `rate_limit.interval_ms` | `60000` |
//! | `ROUTEGATE_RATE_CAPACITY` | `rate_limit.capacity` | `1024` |
//! | `ROUTEGATE_RATE_BINS` | `rate_limit.bins` | `4` |
//!
//! ## TOML
//!
//! ```toml
//! [rate_limit]
//! limit = 100
//! interval_ms = 60000
//! capacity = 4096
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::ratelimit::{DEFAULT_BINS, DEFAULT_CAPACITY, DEFAULT_INTERVAL_MS, DEFAULT_LIMIT};

/// Global rate limiter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u64,
    /// Window length in milliseconds
    pub interval_ms: u64,
    /// Distinct client keys tracked at once
    pub capacity: usize,
    /// Sub-window bins per key
    pub bins: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            interval_ms: DEFAULT_INTERVAL_MS,
            capacity: DEFAULT_CAPACITY,
            bins: DEFAULT_BINS,
        }
    }
}

impl RateLimitConfig {
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero capacity, zero bins, or an interval
    /// that leaves bins narrower than one millisecond.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("rate_limit.capacity must be > 0".into()));
        }
        if self.bins == 0 {
            return Err(ConfigError::Invalid("rate_limit.bins must be > 0".into()));
        }
        if self.interval_ms < self.bins as u64 {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.interval_ms ({}) must be at least rate_limit.bins ({})",
                self.interval_ms, self.bins
            )));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub rate_limit: RateLimitConfig,
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, default = %default, "Ignoring unparsable value");
            default
        }),
        Err(_) => default,
    }
}

impl RouterConfig {
    /// Defaults overridden by `ROUTEGATE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = RateLimitConfig::default();
        RouterConfig {
            rate_limit: RateLimitConfig {
                limit: env_or("ROUTEGATE_RATE_LIMIT", defaults.limit),
                interval_ms: env_or("ROUTEGATE_RATE_INTERVAL_MS", defaults.interval_ms),
                capacity: env_or("ROUTEGATE_RATE_CAPACITY", defaults.capacity),
                bins: env_or("ROUTEGATE_RATE_BINS", defaults.bins),
            },
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, [`ConfigError::Invalid`] if
    /// the values fail validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// See [`RateLimitConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()
    }
}
