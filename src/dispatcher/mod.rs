//! # Dispatcher Module
//!
//! Runs a request through the pipeline:
//!
//! 1. Rate limit keyed by client IP (429 `Too Many Requests`)
//! 2. Route lookup (404 `path not found`)
//! 3. Payload size check for routes with a `max_content_length`
//!    (411 without `Content-Length`, 413 when it is too large)
//! 4. Handler invocation with error and panic containment (500)
//! 5. Rendering into a [`crate::server::RenderedResponse`]
//!
//! Every error response is a JSON body of the form `{"error": "..."}`.
//! Nothing a handler does can make [`Dispatcher::dispatch`] fail or unwind.
//!
//! ```rust
//! use routegate::dispatcher::Dispatcher;
//! use routegate::resource::Resource;
//! use routegate::router::Router;
//! use routegate::server::{Request, Response};
//! use http::Method;
//!
//! let mut pets = Resource::new("pets");
//! pets.get("show", "/pets/:id", |req| {
//!     Ok(Some(Response::json(serde_json::json!({ "id": req.capture("id") }))))
//! });
//! let mut router = Router::new();
//! router.register_resource(pets).unwrap();
//! let dispatcher = Dispatcher::new(router);
//!
//! let mut req = Request::new("127.0.0.1:9000".parse().unwrap(), Method::GET, "/pets/7");
//! let rendered = dispatcher.dispatch(&mut req);
//! assert_eq!(rendered.status, 200);
//! ```

mod core;

pub use core::{
    invoke, Dispatcher, Invocation, INTERNAL_ERROR, LENGTH_REQUIRED, NO_RESPONSE,
    PATH_NOT_FOUND, PAYLOAD_TOO_LARGE, TOO_MANY_REQUESTS,
};
