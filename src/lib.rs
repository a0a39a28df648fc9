//! # routegate
//!
//! **routegate** is an embeddable HTTP request router and dispatch pipeline. It
//! does not accept connections or parse HTTP; the transport hands it a parsed
//! [`server::Request`] and writes back the [`server::RenderedResponse`] it
//! returns.
//!
//! ## Overview
//!
//! For each request routegate:
//!
//! 1. rate limits the client IP with a bounded-memory sliding window,
//! 2. finds the first route whose method and path pattern match,
//! 3. checks the declared body size against the route's limit,
//! 4. calls the handler, turning errors and panics into 500 responses,
//! 5. renders the response to bytes or a stream, gzip-compressed on request.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`router`]** - Path pattern compilation and first-match route resolution
//! - **[`resource`]** - Route and resource builders binding handlers to patterns
//! - **[`dispatcher`]** - The per-request pipeline and handler invocation
//! - **[`ratelimit`]** - Per-client rolling-window limiter in a fixed-size LRU cache
//! - **[`server`]** - Request and response types plus a response writer for transports
//! - **[`static_files`]** - Safe path joining and file responses
//! - **[`testing`]** - In-process client that calls routes by name
//! - **[`config`]** - Rate limit configuration from TOML or environment
//! - **[`logging`]** - `tracing` subscriber setup for binaries
//!
//! ## Quick Start
//!
//! ```rust
//! use routegate::dispatcher::Dispatcher;
//! use routegate::resource::Resource;
//! use routegate::router::Router;
//! use routegate::server::{Request, Response};
//! use http::Method;
//!
//! # fn main() -> Result<(), routegate::RouterError> {
//! let mut users = Resource::new("UserResource");
//! users.get("show", "/user/:name", |req| {
//!     let name = req.capture("name").unwrap_or_default().to_string();
//!     Ok(Some(Response::json(serde_json::json!({ "name": name }))))
//! });
//! users
//!     .put("upload", "/user/:name/avatar", |req| {
//!         let bytes = req.read_body()?;
//!         Ok(Some(Response::json(serde_json::json!({ "size": bytes.len() }))))
//!     })
//!     .max_content_length(64 * 1024);
//!
//! let mut router = Router::new();
//! router.register_resource(users)?;
//! let dispatcher = Dispatcher::new(router);
//!
//! let mut req = Request::new("10.1.2.3:4567".parse().unwrap(), Method::GET, "/user/alice");
//! let rendered = dispatcher.dispatch(&mut req);
//! assert_eq!(rendered.status, 200);
//! assert_eq!(rendered.header("Content-Type"), Some("application/json"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Responses
//!
//! | Status | Body | When |
//! |---|---|---|
//! | 429 | `{"error": "Too Many Requests"}` | client exceeded the rate limit |
//! | 404 | `{"error": "path not found"}` | no route matched |
//! | 411 | `{"error": "Content-Length not specified"}` | size-limited route, no `Content-Length` |
//! | 413 | `{"error": "Payload too large"}` | declared length above the route's limit |
//! | 500 | `{"error": "internal server error"}` | handler error or panic, render failure |
//! | 500 | `{"error": "route failed to return a response"}` | handler returned `None` |

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod logging;
pub mod ratelimit;
pub mod resource;
pub mod router;
pub mod server;
pub mod static_files;
pub mod testing;

pub use config::{RateLimitConfig, RouterConfig};
pub use dispatcher::{Dispatcher, Invocation};
pub use error::{ConfigError, PathError, RenderError, RouterError, TestClientError};
pub use ratelimit::{RateDecision, RateLimiter};
pub use resource::{Resource, Route, RouteOptions};
pub use router::{RouteMatch, Router};
pub use server::{RenderedResponse, Request, Response};
