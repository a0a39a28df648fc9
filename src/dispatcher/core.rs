use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::RouterConfig;
use crate::error::ConfigError;
use crate::ratelimit::RateLimiter;
use crate::resource::Route;
use crate::router::Router;
use crate::server::{ContentLength, RenderedResponse, Request, Response};

pub const TOO_MANY_REQUESTS: &str = "Too Many Requests";
pub const PATH_NOT_FOUND: &str = "path not found";
pub const LENGTH_REQUIRED: &str = "Content-Length not specified";
pub const PAYLOAD_TOO_LARGE: &str = "Payload too large";
pub const INTERNAL_ERROR: &str = "internal server error";
pub const NO_RESPONSE: &str = "route failed to return a response";

/// What happened when a handler ran.
#[derive(Debug)]
pub enum Invocation {
    /// The handler produced a response.
    Responded(Response),
    /// The handler completed without producing one.
    NoResponse,
    /// The handler returned an error.
    Failed(anyhow::Error),
    /// The handler panicked. Carries the panic message.
    Panicked(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `route`'s handler, containing errors and panics.
pub fn invoke(route: &Route, request: &mut Request) -> Invocation {
    match catch_unwind(AssertUnwindSafe(|| route.call(request))) {
        Ok(Ok(Some(response))) => Invocation::Responded(response),
        Ok(Ok(None)) => Invocation::NoResponse,
        Ok(Err(err)) => Invocation::Failed(err),
        Err(payload) => Invocation::Panicked(panic_message(payload.as_ref())),
    }
}

/// Request pipeline: rate limit, route lookup, payload validation, handler
/// invocation and rendering.
///
/// The router is read-only once the dispatcher owns it; the limiter does its
/// own locking. A dispatcher can be shared across threads behind an `Arc` or
/// borrowed by scoped threads.
#[derive(Debug)]
pub struct Dispatcher {
    router: Router,
    limiter: RateLimiter,
}

impl Dispatcher {
    /// Dispatcher with the default rate limiter.
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self::with_rate_limiter(router, RateLimiter::default())
    }

    #[must_use]
    pub fn with_rate_limiter(router: Router, limiter: RateLimiter) -> Self {
        router.log_loaded();
        Self { router, limiter }
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the rate limit settings fail validation.
    pub fn from_config(router: Router, config: &RouterConfig) -> Result<Self, ConfigError> {
        let limiter = RateLimiter::from_config(&config.rate_limit)?;
        info!(
            limit = limiter.limit(),
            interval_ms = limiter.interval_ms(),
            capacity = limiter.capacity(),
            "Rate limiter configured"
        );
        Ok(Self::with_rate_limiter(router, limiter))
    }

    /// Dispatcher that never rate limits in practice, for tests and tools.
    #[must_use]
    pub fn unlimited(router: Router) -> Self {
        let limiter = RateLimiter::new(u64::MAX, 1_000, NonZeroUsize::MIN);
        Self::with_rate_limiter(router, limiter)
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run the full pipeline and render the result.
    ///
    /// Never fails: every problem along the way becomes an error response.
    pub fn dispatch(&self, request: &mut Request) -> RenderedResponse {
        let started = Instant::now();
        let key = request.client_key();

        let decision = self.limiter.check(&key);
        let response = if decision.is_blocked() {
            warn!(
                client = %key,
                count = decision.count(),
                limit = self.limiter.limit(),
                method = %request.method,
                path = %request.path,
                "Rate limit exceeded"
            );
            Response::error(429, TOO_MANY_REQUESTS)
        } else {
            self.handle(request)
        };

        let rendered = match response.render(request) {
            Ok(rendered) => rendered,
            Err(err) => {
                error!(
                    method = %request.method,
                    path = %request.path,
                    error = %err,
                    "Failed to render response"
                );
                RenderedResponse::error(500, INTERNAL_ERROR)
            }
        };

        info!(
            method = %request.method,
            path = %request.path,
            status = rendered.status,
            duration_us = started.elapsed().as_micros() as u64,
            "Dispatch complete"
        );
        rendered
    }

    /// Route, validate and invoke without rate limiting or rendering.
    pub fn handle(&self, request: &mut Request) -> Response {
        let Some(route_match) = self.router.route(&request.method, &request.path) else {
            return Response::error(404, PATH_NOT_FOUND);
        };
        let route = route_match.route.as_ref();

        if let Some(max) = route.options().max_content_length {
            match request.content_length() {
                ContentLength::Missing => {
                    warn!(route = %route.name(), "Request rejected: Content-Length missing");
                    return Response::error(411, LENGTH_REQUIRED);
                }
                ContentLength::Declared(length) if length > max => {
                    warn!(
                        route = %route.name(),
                        content_length = length,
                        max_content_length = max,
                        "Request rejected: payload too large"
                    );
                    return Response::error(413, PAYLOAD_TOO_LARGE);
                }
                ContentLength::Declared(_) => {}
            }
        }

        request.matches = route_match.to_map();

        let started = Instant::now();
        match invoke(route, request) {
            Invocation::Responded(response) => {
                debug!(
                    route = %route.name(),
                    status = response.status(),
                    execution_time_us = started.elapsed().as_micros() as u64,
                    "Handler execution complete"
                );
                response
            }
            Invocation::NoResponse => {
                error!(route = %route.name(), "Handler returned no response");
                Response::error(500, NO_RESPONSE)
            }
            Invocation::Failed(err) => {
                error!(
                    route = %route.name(),
                    method = %request.method,
                    path = %request.path,
                    error = %format!("{err:#}"),
                    "Handler failed"
                );
                Response::error(500, INTERNAL_ERROR)
            }
            Invocation::Panicked(message) => {
                let backtrace = std::backtrace::Backtrace::capture();
                error!(
                    route = %route.name(),
                    panic_message = %message,
                    backtrace = %backtrace,
                    "Handler panicked"
                );
                Response::error(500, INTERNAL_ERROR)
            }
        }
    }
}
