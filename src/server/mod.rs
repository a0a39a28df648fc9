//! # Server Module
//!
//! Request and response types exchanged with the transport.
//!
//! The transport (connection handling, HTTP parsing, TLS) lives outside this
//! crate. It builds a [`Request`] from whatever it parsed, hands it to the
//! [`crate::dispatcher::Dispatcher`], and writes the resulting
//! [`RenderedResponse`], optionally through [`write_response`], which also
//! deals with clients that disconnect mid-write.

pub mod request;
pub mod response;
pub mod writer;

pub use request::{parse_url, ContentLength, HeaderMap, QueryParams, Request};
pub use response::{
    status_reason, HeaderVec, Message, RawBody, RenderedBody, RenderedResponse, Response,
    ResponseBody, ResponseKind, JSON_CONTENT_TYPE, SERIALIZABLE_CONTENT_TYPE,
};
pub use writer::{write_response, WriteOutcome, BUFFER_TX_SIZE};
