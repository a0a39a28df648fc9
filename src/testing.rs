//! In-process client for exercising routes without a transport.
//!
//! Requests are addressed by route name and positional arguments rather than
//! by URL: the client fills the route's pattern to build the path, runs the
//! request through [`Dispatcher::handle`] (no rate limiting), renders the
//! response and drains any stream.
//!
//! ```rust
//! use routegate::dispatcher::Dispatcher;
//! use routegate::resource::Resource;
//! use routegate::router::Router;
//! use routegate::server::Response;
//! use routegate::testing::TestClient;
//!
//! let mut users = Resource::new("users");
//! users.get("show", "/user/:name", |req| {
//!     Ok(Some(Response::text(format!("hi {}", req.capture("name").unwrap_or("")))))
//! });
//! let mut router = Router::new();
//! router.register_resource(users).unwrap();
//! let dispatcher = Dispatcher::new(router);
//!
//! let client = TestClient::new(&dispatcher);
//! let response = client.call("users_show", &["bob"]).unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(response.text(), "hi bob");
//! ```

use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::error::TestClientError;
use crate::resource::Route;
use crate::router::PathTemplate;
use crate::server::{HeaderMap, HeaderVec, QueryParams, Request};

/// Address test requests appear to come from.
#[must_use]
pub fn test_client_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 54321))
}

/// Calls routes by name on a borrowed dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct TestClient<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> TestClient<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Call `route` with positional path arguments and nothing else.
    ///
    /// # Errors
    ///
    /// See [`TestRequest::send`].
    pub fn call(&self, route: &str, args: &[&str]) -> Result<TestResponse, TestClientError> {
        self.request(route)?.args(args).send()
    }

    /// Start building a request for `route` (`group.handler` or
    /// `group_handler`).
    ///
    /// # Errors
    ///
    /// [`TestClientError::UnknownRoute`] if no route has that name.
    pub fn request(&self, route: &str) -> Result<TestRequest<'a>, TestClientError> {
        let route = self
            .dispatcher
            .router()
            .find(route)
            .ok_or_else(|| TestClientError::UnknownRoute(route.to_string()))?;
        Ok(TestRequest {
            dispatcher: self.dispatcher,
            route: Arc::clone(route),
            args: Vec::new(),
            params: QueryParams::new(),
            fragment: String::new(),
            headers: HeaderMap::new(),
            body: None,
        })
    }
}

/// A request under construction.
#[derive(Debug)]
pub struct TestRequest<'a> {
    dispatcher: &'a Dispatcher,
    route: Arc<Route>,
    args: Vec<String>,
    params: QueryParams,
    fragment: String,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl TestRequest<'_> {
    /// Positional arguments for the route's tokens. Extra arguments become
    /// extra path segments.
    #[must_use]
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|a| (*a).to_string()));
        self
    }

    #[must_use]
    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .entry(name.to_string())
            .or_default()
            .push(value.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = fragment.into();
        self
    }

    /// Request body. `Content-Length` is declared from it unless a header
    /// sets one explicitly.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build the request, dispatch it and collect the response.
    ///
    /// # Errors
    ///
    /// [`TestClientError::Route`] when fewer arguments than the pattern
    /// requires were given, [`TestClientError::Render`] if the response
    /// cannot be rendered, [`TestClientError::Io`] if draining a streamed
    /// body fails.
    pub fn send(self) -> Result<TestResponse, TestClientError> {
        let TestRequest {
            dispatcher,
            route,
            args,
            params,
            fragment,
            mut headers,
            body,
        } = self;

        let template = PathTemplate::parse(route.pattern())?;
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let path = template.fill(&arg_refs)?;

        let body = body.map_or_else(Vec::new, |bytes| {
            if !headers.contains("Content-Length") {
                headers.insert("Content-Length", bytes.len().to_string());
            }
            bytes
        });

        debug!(route = %route.name(), method = %route.method(), path = %path, "Test request");
        let mut request = Request::from_parts(
            test_client_addr(),
            route.method().clone(),
            path,
            params,
            fragment,
            headers,
            Box::new(Cursor::new(body)),
        );

        let rendered = dispatcher.handle(&mut request).render(&request)?;
        let status = rendered.status;
        let headers = rendered.headers;
        let body = rendered.body.into_bytes()?;

        Ok(TestResponse {
            status,
            headers,
            body,
            request,
        })
    }
}

/// A fully collected response plus the request that produced it.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderVec,
    /// Body exactly as rendered, compressed if the response was.
    pub body: Vec<u8>,
    pub request: Request,
}

impl TestResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.header("Content-Encoding") == Some("gzip")
    }

    /// Body with gzip undone when the response was compressed.
    ///
    /// # Errors
    ///
    /// Fails if a compressed body is not valid gzip.
    pub fn decoded_body(&self) -> std::io::Result<Vec<u8>> {
        if !self.is_compressed() {
            return Ok(self.body.clone());
        }
        let mut out = Vec::new();
        GzDecoder::new(self.body.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    }

    /// Decoded body as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        match self.decoded_body() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::from_utf8_lossy(&self.body).into_owned(),
        }
    }

    /// Decoded body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Fails on invalid gzip or JSON.
    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(&self.decoded_body()?)?)
    }
}
