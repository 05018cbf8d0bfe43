//! Instrumented response writer.
//!
//! # Responsibilities
//! - Decorate the underlying response sink without changing its semantics
//! - Track whether headers were sent, the committed status and bytes written
//! - Defer header emission until the first byte is written or forced
//!
//! # Design Decisions
//! - "Nothing happened yet" is `size == None`, distinct from `Some(0)`
//!   (headers sent, empty body)
//! - Status changes after commit are diagnostics, never errors
//! - The server-side sink buffers the response; it is turned into an axum
//!   `Response` once the handler chain has finished
//! - The buffered header set is frozen when the status goes out; later
//!   edits land in a scratch map that is never sent

use std::io;

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};

/// The transport-level sink a [`TrackedWriter`] forwards to.
pub trait ResponseSink: Send {
    /// Headers that will be sent with the status line. Once the status is
    /// out, edits through this map must not reach the client.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Emit the status line. Called at most once per request by [`TrackedWriter`].
    fn write_status(&mut self, status: StatusCode);

    /// Write body bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

/// Capability set handed to handlers, renderers and middlewares.
pub trait ResponseWriter: Send {
    /// Response headers; changes after the first write have no effect on the wire.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Record the status to send. Ignored (with a warning) once headers are out.
    fn write_header(&mut self, code: StatusCode);

    /// Send headers now if they have not been sent yet. Idempotent.
    fn write_header_now(&mut self);

    /// Send headers if needed, then forward `data` to the sink.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// Status that was (or will be) sent.
    fn status(&self) -> StatusCode;

    /// Bytes written so far; `None` until headers are sent.
    fn size(&self) -> Option<usize>;

    /// True once headers have been sent.
    fn written(&self) -> bool {
        self.size().is_some()
    }
}

/// Response writer wrapper tracking status and size over a [`ResponseSink`].
#[derive(Debug)]
pub struct TrackedWriter<S> {
    sink: S,
    size: Option<usize>,
    status: StatusCode,
}

impl<S: ResponseSink> TrackedWriter<S> {
    /// Wrap `sink` with nothing written and a default status of 200.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            size: None,
            status: StatusCode::OK,
        }
    }

    /// Rebind to a fresh sink and forget everything about the previous one.
    pub fn reset(&mut self, sink: S) {
        self.sink = sink;
        self.size = None;
        self.status = StatusCode::OK;
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: ResponseSink> ResponseWriter for TrackedWriter<S> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    fn write_header(&mut self, code: StatusCode) {
        if self.status == code {
            return;
        }
        if self.written() {
            tracing::warn!(
                sent = %self.status,
                wanted = %code,
                "Headers were already written, status code not overridden"
            );
            return;
        }
        self.status = code;
    }

    fn write_header_now(&mut self) {
        if self.size.is_none() {
            self.size = Some(0);
            self.sink.write_status(self.status);
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_header_now();
        let n = self.sink.write(data)?;
        self.size = Some(self.size.unwrap_or(0) + n);
        Ok(n)
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn size(&self) -> Option<usize> {
        self.size
    }
}

/// Sink that collects the response in memory for the axum listener.
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    sent: Option<HeaderMap>,
    body: Vec<u8>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status emitted through [`ResponseSink::write_status`], if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Headers sent with the status, or the pending set before that.
    pub fn headers(&self) -> &HeaderMap {
        self.sent.as_ref().unwrap_or(&self.headers)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Move the collected response out, leaving the sink empty.
    ///
    /// A response whose headers were never sent goes out as an empty 200.
    pub fn take_response(&mut self) -> Response {
        let mut response = Response::new(Body::from(std::mem::take(&mut self.body)));
        *response.status_mut() = self.status.take().unwrap_or(StatusCode::OK);
        let pending = std::mem::take(&mut self.headers);
        *response.headers_mut() = self.sent.take().unwrap_or(pending);
        response
    }
}

impl ResponseSink for BufferedSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.sent = Some(std::mem::take(&mut self.headers));
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}
