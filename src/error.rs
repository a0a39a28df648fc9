//! Error types shared across the crate.
//!
//! Startup-time problems (bad patterns, unsupported methods, malformed rate
//! annotations) surface as [`RouterError`] from route registration and are
//! meant to abort startup. Per-request problems never use these types: the
//! dispatcher turns them into JSON error responses instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The path pattern violates the pattern grammar.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern string
        pattern: String,
        /// What is wrong with it
        reason: String,
    },

    /// A route was registered for a method outside GET/PUT/POST/DELETE.
    #[error("unsupported method {method} for route '{route}'")]
    UnsupportedMethod {
        /// Route name
        route: String,
        /// The method that was rejected
        method: String,
    },

    /// A per-route rate annotation could not be parsed.
    #[error("invalid rate limit '{spec}': {reason}")]
    InvalidRateLimit {
        /// The annotation as written
        spec: String,
        /// What is wrong with it
        reason: String,
    },

    /// A path template was filled with fewer arguments than it requires.
    #[error("pattern '{pattern}' expects {expected} positional arguments, found {found}")]
    MissingArguments {
        /// The pattern being filled
        pattern: String,
        /// Number of required tokens
        expected: usize,
        /// Number of arguments supplied
        found: usize,
    },
}

impl RouterError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading [`crate::config::RouterConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by [`crate::static_files::path_join_safe`] and file loading.
#[derive(Debug, Error)]
pub enum PathError {
    /// The untrusted filename contains a `.` or `..` component.
    #[error("invalid path: illegal component in '{0}'")]
    IllegalComponent(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised while rendering a [`crate::server::Response`] to bytes.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The JSON or custom serializer refused the payload.
    #[error("failed to encode response payload: {0:#}")]
    Encode(anyhow::Error),

    #[error("failed to compress response payload: {0}")]
    Compress(#[source] io::Error),
}

/// Errors raised by [`crate::testing::TestClient`] before or after a request
/// runs. Handler failures are not errors here; they come back as 500s.
#[derive(Debug, Error)]
pub enum TestClientError {
    #[error("no route named '{0}'")]
    UnknownRoute(String),

    #[error(transparent)]
    Route(#[from] RouterError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to read response body: {0}")]
    Io(#[from] io::Error),
}
