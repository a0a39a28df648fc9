use std::io::{self, ErrorKind, Read, Write};
use std::time::Instant;

use tracing::{info, warn};

use super::request::Request;
use super::response::{status_reason, RenderedBody, RenderedResponse};

/// Chunk size used when copying a streamed body to the client.
pub const BUFFER_TX_SIZE: usize = 2048;

/// How writing a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Everything was written.
    Complete { bytes_written: u64 },
    /// The client went away mid-write. Terminal for this request only.
    Aborted { bytes_written: u64 },
}

impl WriteOutcome {
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        match self {
            WriteOutcome::Complete { bytes_written } | WriteOutcome::Aborted { bytes_written } => {
                *bytes_written
            }
        }
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset
    )
}

/// Write a rendered response as HTTP/1.1 to `out`.
///
/// Adds `Content-Length` for in-memory bodies that lack one. Streamed bodies
/// are copied in [`BUFFER_TX_SIZE`] chunks. A client disconnect is logged and
/// reported as [`WriteOutcome::Aborted`]; any other I/O error is returned.
/// One access-log event is emitted per call.
pub fn write_response<W: Write>(
    out: &mut W,
    rendered: RenderedResponse,
    request: &Request,
    started: Instant,
) -> io::Result<WriteOutcome> {
    let status = rendered.status;
    let compressed = rendered.is_compressed();
    let mut written = 0u64;

    let result = write_all_parts(out, rendered, &mut written);

    let outcome = match result {
        Ok(()) => WriteOutcome::Complete {
            bytes_written: written,
        },
        Err(err) if is_disconnect(&err) => {
            warn!(
                client = %request.client_addr,
                method = %request.method,
                path = %request.path,
                bytes_written = written,
                error = %err,
                "Client disconnected while writing response"
            );
            WriteOutcome::Aborted {
                bytes_written: written,
            }
        }
        Err(err) => return Err(err),
    };

    info!(
        client = %request.client_addr,
        status = status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        method = %request.method,
        path = %request.path,
        bytes = outcome.bytes_written(),
        compressed = compressed,
        "access"
    );

    Ok(outcome)
}

fn write_all_parts<W: Write>(
    out: &mut W,
    rendered: RenderedResponse,
    written: &mut u64,
) -> io::Result<()> {
    let RenderedResponse {
        status,
        headers,
        body,
    } = rendered;

    let mut head = format!("HTTP/1.1 {} {}\r\n", status, status_reason(status));
    let mut has_length = false;
    for (name, value) in &headers {
        if name.eq_ignore_ascii_case("content-length") {
            has_length = true;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    match (&body, has_length) {
        (RenderedBody::Bytes(bytes), false) => {
            head.push_str(&format!("Content-Length: {}\r\n", bytes.len()));
        }
        (RenderedBody::Stream(_), false) => head.push_str("Connection: close\r\n"),
        _ => {}
    }
    head.push_str("\r\n");

    out.write_all(head.as_bytes())?;
    *written += head.len() as u64;

    match body {
        RenderedBody::Bytes(bytes) => {
            out.write_all(&bytes)?;
            *written += bytes.len() as u64;
        }
        RenderedBody::Stream(mut reader) => {
            let mut buf = [0u8; BUFFER_TX_SIZE];
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                out.write_all(&buf[..n])?;
                *written += n as u64;
            }
        }
    }
    out.flush()
}
