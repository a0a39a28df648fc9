//! Route descriptors and the [`Resource`] builder that collects them.
//!
//! A resource groups related handlers. Each registration call appends one
//! [`Route`] and the order of those calls is the match precedence used by the
//! router: register specific routes before general ones.
//!
//! ```rust
//! use routegate::resource::Resource;
//! use routegate::server::Response;
//! use serde_json::json;
//!
//! let mut users = Resource::new("UserResource");
//! users.get("get_user", "/user/:name", |req| {
//!     let name = req.capture("name").unwrap_or_default().to_string();
//!     Ok(Some(Response::json(json!({ "name": name }))))
//! });
//! users
//!     .put("set_avatar", "/user/:name/avatar", |_req| Ok(Some(Response::text("ok"))))
//!     .max_content_length(64 * 1024);
//!
//! assert_eq!(users.routes()[0].name(), "user.get_user");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use http::Method;

use crate::error::RouterError;
use crate::server::{Request, Response};

/// Default body limit applied to PUT and POST routes (5 MiB).
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 5 * 1024 * 1024;

/// What a handler hands back to the dispatcher.
///
/// `Ok(None)` means the handler produced no response, which the dispatcher
/// reports as a 500.
pub type HandlerResult = anyhow::Result<Option<Response>>;

/// A handler callback bound to a route.
pub type Handler = Arc<dyn Fn(&mut Request) -> HandlerResult + Send + Sync>;

/// Time unit of a per-route rate annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateUnit {
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            RateUnit::Second => Duration::from_secs(1),
            RateUnit::Minute => Duration::from_secs(60),
            RateUnit::Hour => Duration::from_secs(60 * 60),
            RateUnit::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A per-route rate annotation such as `"5/minute"`.
///
/// Parsed and stored on [`RouteOptions`], but the dispatcher enforces a
/// single global limiter and does not consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSpec {
    pub count: u64,
    pub unit: RateUnit,
}

impl RateLimitSpec {
    /// Window length of the annotation.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.unit.duration()
    }
}

impl FromStr for RateLimitSpec {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RouterError::InvalidRateLimit {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let (count, unit) = s
            .split_once('/')
            .ok_or_else(|| invalid("expected '<count>/<unit>'"))?;
        let count = count
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid("count is not a non-negative integer"))?;
        let unit = match unit.trim() {
            "second" => RateUnit::Second,
            "minute" => RateUnit::Minute,
            "hour" => RateUnit::Hour,
            "day" => RateUnit::Day,
            _ => return Err(invalid("unit must be one of second, minute, hour, day")),
        };

        Ok(Self { count, unit })
    }
}

/// Per-route options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    /// Maximum declared request body size in bytes. When set, requests must
    /// carry a `Content-Length` header.
    pub max_content_length: Option<u64>,
    /// Rate annotation carried as configuration data only.
    pub rate_limit: Option<RateLimitSpec>,
}

/// A handler bound to an HTTP method and path pattern.
///
/// Immutable once handed to the router.
#[derive(Clone)]
pub struct Route {
    name: String,
    method: Method,
    pattern: String,
    handler: Handler,
    options: RouteOptions,
}

impl Route {
    /// Build a route with default options.
    pub fn new<F>(name: impl Into<String>, method: Method, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            method,
            pattern: pattern.into(),
            handler: Arc::new(handler),
            options: RouteOptions::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Call the handler.
    pub fn call(&self, request: &mut Request) -> HandlerResult {
        (self.handler)(request)
    }

    /// Require a `Content-Length` header no larger than `bytes`.
    pub fn max_content_length(&mut self, bytes: u64) -> &mut Self {
        self.options.max_content_length = Some(bytes);
        self
    }

    /// Drop the body size check.
    pub fn no_content_limit(&mut self) -> &mut Self {
        self.options.max_content_length = None;
        self
    }

    /// Attach a rate annotation such as `"10/second"`.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidRateLimit`] if the annotation does not parse.
    pub fn rate_limit(&mut self, spec: &str) -> Result<&mut Self, RouterError> {
        self.options.rate_limit = Some(spec.parse()?);
        Ok(self)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// An ordered collection of related routes.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    group: String,
    routes: Vec<Route>,
}

impl Resource {
    /// Start a resource. The group name prefixes every route name; a trailing
    /// `Resource` is dropped and the rest lower-cased, so `UserResource`
    /// yields routes named `user.<handler>`.
    #[must_use]
    pub fn new(group: &str) -> Self {
        let group = group.strip_suffix("Resource").unwrap_or(group);
        Self {
            group: group.to_lowercase(),
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Append a route for any method. Method support is checked when the
    /// resource is registered with a router.
    pub fn route<F>(&mut self, method: Method, name: &str, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        let full_name = if self.group.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.group, name)
        };
        let index = self.routes.len();
        self.routes.push(Route::new(full_name, method, pattern, handler));
        &mut self.routes[index]
    }

    pub fn get<F>(&mut self, name: &str, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::GET, name, pattern, handler)
    }

    pub fn delete<F>(&mut self, name: &str, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::DELETE, name, pattern, handler)
    }

    /// PUT route limited to [`DEFAULT_MAX_CONTENT_LENGTH`] unless overridden.
    pub fn put<F>(&mut self, name: &str, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::PUT, name, pattern, handler)
            .max_content_length(DEFAULT_MAX_CONTENT_LENGTH)
    }

    /// POST route limited to [`DEFAULT_MAX_CONTENT_LENGTH`] unless overridden.
    pub fn post<F>(&mut self, name: &str, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::POST, name, pattern, handler)
            .max_content_length(DEFAULT_MAX_CONTENT_LENGTH)
    }

    /// Routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn into_routes(self) -> Vec<Route> {
        self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl IntoIterator for Resource {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}
