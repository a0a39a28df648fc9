//! # Router Module
//!
//! Path matching and route resolution.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling path patterns such as `/user/:name` into matchers
//! - Matching a (method, path) pair to the first registered route that accepts it
//! - Extracting token captures from the matched path
//!
//! ## Architecture
//!
//! The router uses a two-phase approach:
//!
//! 1. **Compilation**: At registration, each route's pattern is compiled by
//!    [`pattern::CompiledPattern`] into an anchored regex plus its ordered
//!    token names. A malformed pattern fails registration.
//!
//! 2. **Matching**: For each request, the router walks the list for the
//!    request method in registration order and returns the first route whose
//!    pattern matches. Order is the only precedence rule.
//!
//! ## Example
//!
//! ```rust
//! use routegate::resource::Resource;
//! use routegate::router::Router;
//! use routegate::server::Response;
//! use http::Method;
//!
//! # fn main() -> Result<(), routegate::RouterError> {
//! let mut users = Resource::new("users");
//! users.get("show", "/user/:name", |req| {
//!     let name = req.capture("name").unwrap_or_default().to_string();
//!     Ok(Some(Response::text(name)))
//! });
//!
//! let mut router = Router::new();
//! router.register_resource(users)?;
//!
//! let m = router.route(&Method::GET, "/user/alice").unwrap();
//! assert_eq!(m.route.name(), "users.show");
//! assert_eq!(m.get("name"), Some("alice"));
//! # Ok(())
//! # }
//! ```

mod core;
pub mod pattern;

pub use core::{RouteMatch, Router};
pub use pattern::{CaptureVec, CompiledPattern, PathTemplate, TokenKind};
