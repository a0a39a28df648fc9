use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::net::SocketAddr;
use std::num::IntErrorKind;

use anyhow::Context;
use http::Method;
use serde::de::DeserializeOwned;

use super::response::Message;

/// Decoded query parameters. Repeated keys keep every value in order.
pub type QueryParams = HashMap<String, Vec<String>>;

/// Request headers with case-insensitive names.
///
/// Names are stored upper-cased; values keep the order the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: HashMap<String, Vec<String>>,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_ascii_uppercase()
    }

    /// Add a value, keeping any existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.inner.entry(Self::key(name)).or_default().push(value.into());
    }

    /// Replace all values of `name` with `value`.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(Self::key(name), vec![value.into()]);
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&Self::key(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.inner
            .get(&Self::key(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&Self::key(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

/// What the `Content-Length` header declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLength {
    /// No `Content-Length` header present
    Missing,
    /// Declared size; malformed or negative values count as zero, values
    /// beyond `u64` saturate to `u64::MAX`
    Declared(u64),
}

impl ContentLength {
    fn from_header(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return ContentLength::Missing;
        };
        let declared = match raw.trim().parse::<u64>() {
            Ok(n) => n,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
            Err(_) => 0,
        };
        ContentLength::Declared(declared)
    }
}

/// Split a request target into decoded path, query parameters and fragment.
///
/// The path is percent-decoded; a path that does not decode to UTF-8 is kept
/// as sent. Query pairs split on `&` and the first `=`, then each side is
/// percent-decoded the same way. `+` stays a literal `+`, and a bare `key`
/// maps to an empty value.
///
/// # Example
///
/// ```rust
/// use routegate::server::parse_url;
///
/// let (path, query, fragment) = parse_url("/files/a%20b?tag=x&tag=y#top");
/// assert_eq!(path, "/files/a b");
/// assert_eq!(query["tag"], vec!["x", "y"]);
/// assert_eq!(fragment, "top");
/// ```
#[must_use]
pub fn parse_url(target: &str) -> (String, QueryParams, String) {
    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, fragment.to_string()),
        None => (target, String::new()),
    };
    let (raw_path, raw_query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };

    let path = percent_decode(raw_path);

    let mut query = QueryParams::new();
    for pair in raw_query.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        query
            .entry(percent_decode(name))
            .or_default()
            .push(percent_decode(value));
    }

    (path, query, fragment)
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// A parsed request as handed over by the transport.
///
/// `matches` starts empty and is filled with path captures when the
/// dispatcher finds a route.
pub struct Request {
    pub client_addr: SocketAddr,
    pub method: Method,
    pub path: String,
    pub params: QueryParams,
    pub fragment: String,
    pub headers: HeaderMap,
    pub matches: HashMap<String, String>,
    body: Box<dyn Read + Send>,
}

impl Request {
    /// Build a request from a raw target (`/path?query#fragment`) with no
    /// headers and an empty body.
    #[must_use]
    pub fn new(client_addr: SocketAddr, method: Method, target: &str) -> Self {
        let (path, params, fragment) = parse_url(target);
        Self {
            client_addr,
            method,
            path,
            params,
            fragment,
            headers: HeaderMap::new(),
            matches: HashMap::new(),
            body: Box::new(io::empty()),
        }
    }

    /// Build a request from parts the transport already decoded.
    #[must_use]
    pub fn from_parts(
        client_addr: SocketAddr,
        method: Method,
        path: String,
        params: QueryParams,
        fragment: String,
        headers: HeaderMap,
        body: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            client_addr,
            method,
            path,
            params,
            fragment,
            headers,
            matches: HashMap::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_body<R: Read + Send + 'static>(mut self, body: R) -> Self {
        self.body = Box::new(body);
        self
    }

    /// Use `bytes` as the body. `Content-Length` is not set; add it with
    /// [`Self::with_header`] when the route checks body size.
    #[must_use]
    pub fn with_body_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.with_body(Cursor::new(bytes.into()))
    }

    /// IP string the rate limiter keys on.
    #[must_use]
    pub fn client_key(&self) -> String {
        self.client_addr.ip().to_string()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// First value of query parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn params_all(&self, name: &str) -> &[String] {
        self.params
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Path capture for token `name`.
    #[must_use]
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.matches.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn content_length(&self) -> ContentLength {
        ContentLength::from_header(self.headers.get("Content-Length"))
    }

    /// The body stream, for handlers that copy it elsewhere.
    pub fn body_mut(&mut self) -> &mut (dyn Read + Send) {
        self.body.as_mut()
    }

    /// Read the remaining body into memory.
    pub fn read_body(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        let bytes = self.read_body().context("failed to read request body")?;
        serde_json::from_slice(&bytes).context("request body is not valid JSON")
    }

    /// Decode the body with the custom serialization format.
    pub fn message<T: Message>(&mut self) -> anyhow::Result<T> {
        let bytes = self.read_body().context("failed to read request body")?;
        T::decode(&bytes)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("client_addr", &self.client_addr)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("fragment", &self.fragment)
            .field("headers", &self.headers)
            .field("matches", &self.matches)
            .finish_non_exhaustive()
    }
}
