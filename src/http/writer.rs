//! Buffered response writer handed to responders.

use std::io;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use super::{Headers, Response, StatusCode};

/// Accumulates the status, headers and body of one response.
///
/// The status is committed by the first [`write_header`](Self::write_header)
/// call or, failing that, by the first body write (which commits `200 OK`).
/// Once committed it never changes: later `write_header` calls are dropped, so
/// an error surfaced after a responder has already produced output is appended
/// to that output rather than replacing it.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use baton::http::{ResponseWriter, StatusCode};
///
/// let mut w = ResponseWriter::new();
/// w.write_all(b"partial").unwrap();
/// w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
///
/// let response = w.into_response();
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.content(), b"partial");
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: Headers,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers to send. Mutations made after the status is committed are still
    /// sent, since nothing reaches the wire before dispatch finishes.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Commits `status` unless a status is already committed.
    pub fn write_header(&mut self, status: StatusCode) {
        match self.status {
            Some(committed) => {
                debug!(
                    committed = committed.as_u16(),
                    ignored = status.as_u16(),
                    "superfluous write_header call"
                );
            }
            None => self.status = Some(status),
        }
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Appends `bytes` to the body, committing `200 OK` if no status is set.
    pub fn put(&mut self, bytes: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.put_slice(bytes);
    }

    /// Consumes the writer, producing the response the transport will send.
    pub fn into_response(self) -> Response {
        Response::new(self.status.unwrap_or(StatusCode::OK))
            .headers_from(self.headers)
            .body_bytes(self.body.to_vec())
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.put(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
