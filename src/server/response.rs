use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::Compression;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;

use super::request::Request;
use crate::error::RenderError;

/// Content type of JSON and error bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of bodies produced by a [`Message`] encoder.
pub const SERIALIZABLE_CONTENT_TYPE: &str = "application/x-serializable";

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Response headers in insertion order. Names are case-sensitive as supplied.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// The custom binary serialization format, supplied by the application.
///
/// The router never looks inside the bytes; it only asks a message to encode
/// itself when rendering and hands request bodies to [`Message::decode`].
pub trait Message: Send {
    fn encode(&self) -> anyhow::Result<Vec<u8>>;

    fn decode(bytes: &[u8]) -> anyhow::Result<Self>
    where
        Self: Sized;
}

/// Raw payloads: an in-memory buffer or a reader the transport drains.
pub enum RawBody {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

/// The closed set of response payloads.
pub enum ResponseBody {
    Raw(RawBody),
    Json(Value),
    Serialized(Box<dyn Message>),
    /// Rendered as `{"error": <message>}`
    Error(String),
}

/// Tag of a [`ResponseBody`], for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Raw,
    Json,
    Serialized,
    Error,
}

/// A handler's answer, rendered to bytes exactly once.
///
/// [`Response::render`] takes `self`, so a response cannot be rendered (and
/// compressed) twice.
pub struct Response {
    status: u16,
    headers: HeaderVec,
    body: ResponseBody,
    compress: bool,
}

impl Response {
    fn with_body(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body,
            compress: false,
        }
    }

    /// 200 with raw bytes. No `Content-Type` is set.
    #[must_use]
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_body(200, ResponseBody::Raw(RawBody::Bytes(bytes.into())))
    }

    /// 200 with UTF-8 text as raw bytes.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::raw(text.into().into_bytes())
    }

    /// 200 with a body the transport streams to the client.
    #[must_use]
    pub fn stream<R: Read + Send + 'static>(reader: R) -> Self {
        Self::with_body(200, ResponseBody::Raw(RawBody::Stream(Box::new(reader))))
    }

    /// 200 with a JSON body.
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::with_body(200, ResponseBody::Json(value))
    }

    /// 200 with any serializable value as JSON.
    pub fn json_from<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::json(serde_json::to_value(value)?))
    }

    /// 200 with a custom-serialized message.
    #[must_use]
    pub fn serialized<M: Message + 'static>(message: M) -> Self {
        Self::with_body(200, ResponseBody::Serialized(Box::new(message)))
    }

    /// An error response with body `{"error": message}`.
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::with_body(status, ResponseBody::Error(message.into()))
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// gzip the rendered payload.
    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Set a header, replacing one with exactly the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compress
    }

    #[must_use]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self.body {
            ResponseBody::Raw(_) => ResponseKind::Raw,
            ResponseBody::Json(_) => ResponseKind::Json,
            ResponseBody::Serialized(_) => ResponseKind::Serialized,
            ResponseBody::Error(_) => ResponseKind::Error,
        }
    }

    /// Encode the payload and finish the headers.
    ///
    /// Sets `Content-Type` for JSON, serialized and error bodies and
    /// `Content-Length` for every in-memory body. When compression is on, the
    /// encoded bytes are gzipped, `Content-Encoding: gzip` and
    /// `Vary: Accept-Encoding` are added, and `Content-Length` counts the
    /// compressed bytes. Streams are compressed lazily and carry no length.
    ///
    /// # Errors
    ///
    /// [`RenderError::Encode`] when the JSON or custom encoder fails,
    /// [`RenderError::Compress`] when gzip fails.
    pub fn render(self, _request: &Request) -> Result<RenderedResponse, RenderError> {
        let Response {
            status,
            mut headers,
            body,
            compress,
        } = self;

        let (content_type, encoded) = match body {
            ResponseBody::Raw(RawBody::Stream(reader)) => {
                let body: Box<dyn Read + Send> = if compress {
                    set_compression_headers(&mut headers);
                    Box::new(flate2::read::GzEncoder::new(reader, Compression::default()))
                } else {
                    reader
                };
                return Ok(RenderedResponse {
                    status,
                    headers,
                    body: RenderedBody::Stream(body),
                });
            }
            ResponseBody::Raw(RawBody::Bytes(bytes)) => (None, bytes),
            ResponseBody::Json(value) => {
                let mut bytes =
                    serde_json::to_vec(&value).map_err(|e| RenderError::Encode(e.into()))?;
                bytes.push(b'\n');
                (Some(JSON_CONTENT_TYPE), bytes)
            }
            ResponseBody::Serialized(message) => {
                let bytes = message.encode().map_err(RenderError::Encode)?;
                (Some(SERIALIZABLE_CONTENT_TYPE), bytes)
            }
            ResponseBody::Error(message) => (Some(JSON_CONTENT_TYPE), error_body(&message)),
        };

        let bytes = if compress {
            set_compression_headers(&mut headers);
            gzip(&encoded).map_err(RenderError::Compress)?
        } else {
            encoded
        };

        if let Some(content_type) = content_type {
            set_header(&mut headers, "Content-Type", content_type.to_string());
        }
        set_header(&mut headers, "Content-Length", bytes.len().to_string());

        Ok(RenderedResponse {
            status,
            headers,
            body: RenderedBody::Bytes(bytes),
        })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("kind", &self.kind())
            .field("headers", &self.headers)
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

/// Final body handed to the transport.
pub enum RenderedBody {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

impl RenderedBody {
    /// Byte length, if known without draining a stream.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            RenderedBody::Bytes(bytes) => Some(bytes.len()),
            RenderedBody::Stream(_) => None,
        }
    }

    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, RenderedBody::Stream(_))
    }

    /// Collect the body, draining a stream.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            RenderedBody::Bytes(bytes) => Ok(bytes),
            RenderedBody::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for RenderedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderedBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RenderedBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Status, headers and body ready for the wire.
#[derive(Debug)]
pub struct RenderedResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: RenderedBody,
}

impl RenderedResponse {
    /// An uncompressed JSON error. Cannot fail, so the dispatcher uses it when
    /// rendering the real response does.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        let bytes = error_body(message);
        let mut headers = HeaderVec::new();
        set_header(&mut headers, "Content-Type", JSON_CONTENT_TYPE.to_string());
        set_header(&mut headers, "Content-Length", bytes.len().to_string());
        Self {
            status,
            headers,
            body: RenderedBody::Bytes(bytes),
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.header("Content-Encoding") == Some("gzip")
    }
}

/// Reason phrase for the status line.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        411 => "Length Required",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn find_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.as_ref() == name)
        .map(|(_, v)| v.as_str())
}

fn set_header(headers: &mut HeaderVec, name: &str, value: String) {
    if let Some(slot) = headers.iter_mut().find(|(k, _)| k.as_ref() == name) {
        slot.1 = value;
    } else {
        headers.push((Arc::from(name), value));
    }
}

fn set_compression_headers(headers: &mut HeaderVec) {
    set_header(headers, "Vary", "Accept-Encoding".to_string());
    set_header(headers, "Content-Encoding", "gzip".to_string());
}

fn error_body(message: &str) -> Vec<u8> {
    let mut bytes = serde_json::json!({ "error": message }).to_string().into_bytes();
    bytes.push(b'\n');
    bytes
}

fn gzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use http::Method;
    use serde_json::json;
    use std::io::Cursor;
    use std::net::SocketAddr;

    fn request() -> Request {
        Request::new(SocketAddr::from(([127, 0, 0, 1], 9000)), Method::GET, "/")
    }

    fn gunzip(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
        out
    }

    struct Pair(u8, u8);

    impl Message for Pair {
        fn encode(&self) -> anyhow::Result<Vec<u8>> {
            Ok(vec![0xB1, self.0, self.1])
        }

        fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
            match bytes {
                [0xB1, a, b] => Ok(Pair(*a, *b)),
                _ => anyhow::bail!("not a pair"),
            }
        }
    }

    struct Unencodable;

    impl Message for Unencodable {
        fn encode(&self) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("no encoder for this type")
        }

        fn decode(_bytes: &[u8]) -> anyhow::Result<Self> {
            Ok(Unencodable)
        }
    }

    #[test]
    fn test_json_render() {
        let rendered = Response::json(json!({"a": 1})).render(&request()).unwrap();
        assert_eq!(rendered.status, 200);
        assert_eq!(rendered.header("Content-Type"), Some("application/json"));
        assert_eq!(rendered.header("Content-Length"), Some("8"));
        let body = rendered.body.into_bytes().unwrap();
        assert_eq!(body, b"{\"a\":1}\n");
    }

    #[test]
    fn test_error_render() {
        let rendered = Response::error(404, "path not found").render(&request()).unwrap();
        assert_eq!(rendered.status, 404);
        let body: Value = serde_json::from_slice(&rendered.body.into_bytes().unwrap()).unwrap();
        assert_eq!(body, json!({"error": "path not found"}));
    }

    #[test]
    fn test_raw_render_sets_length_only() {
        let rendered = Response::text("hello").render(&request()).unwrap();
        assert_eq!(rendered.header("Content-Length"), Some("5"));
        assert_eq!(rendered.header("Content-Type"), None);
    }

    #[test]
    fn test_handler_headers_survive() {
        let rendered = Response::text("<p>hi</p>")
            .with_header("Content-Type", "text/html")
            .with_header("Cache-Control", "no-store")
            .render(&request())
            .unwrap();
        assert_eq!(rendered.header("Content-Type"), Some("text/html"));
        assert_eq!(rendered.header("Cache-Control"), Some("no-store"));
    }

    #[test]
    fn test_compressed_raw() {
        let payload = "abc".repeat(200);
        let rendered = Response::text(payload.clone())
            .compressed()
            .render(&request())
            .unwrap();
        assert_eq!(rendered.header("Content-Encoding"), Some("gzip"));
        assert_eq!(rendered.header("Vary"), Some("Accept-Encoding"));
        let length: usize = rendered.header("Content-Length").unwrap().parse().unwrap();
        let body = rendered.body.into_bytes().unwrap();
        assert_eq!(body.len(), length);
        assert_eq!(gunzip(&body), payload.as_bytes());
    }

    #[test]
    fn test_compressed_json() {
        let rendered = Response::json(json!({"k": "v"}))
            .compressed()
            .render(&request())
            .unwrap();
        assert!(rendered.is_compressed());
        assert_eq!(rendered.header("Content-Type"), Some("application/json"));
        let body = gunzip(&rendered.body.into_bytes().unwrap());
        assert_eq!(body, b"{\"k\":\"v\"}\n");
    }

    #[test]
    fn test_compressed_stream() {
        let rendered = Response::stream(Cursor::new(b"streamed".to_vec()))
            .compressed()
            .render(&request())
            .unwrap();
        assert!(rendered.body.is_stream());
        assert_eq!(rendered.header("Content-Length"), None);
        let body = gunzip(&rendered.body.into_bytes().unwrap());
        assert_eq!(body, b"streamed");
    }

    #[test]
    fn test_serialized_render() {
        let rendered = Response::serialized(Pair(1, 2)).render(&request()).unwrap();
        assert_eq!(rendered.header("Content-Type"), Some(SERIALIZABLE_CONTENT_TYPE));
        assert_eq!(rendered.header("Content-Length"), Some("3"));
        let body = rendered.body.into_bytes().unwrap();
        let Pair(a, b) = Pair::decode(&body).unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn test_serialized_encode_failure() {
        let err = Response::serialized(Unencodable).render(&request()).unwrap_err();
        assert!(matches!(err, RenderError::Encode(_)));
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(429), "Too Many Requests");
    }
}
