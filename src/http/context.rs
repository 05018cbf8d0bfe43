//! Per-request context.
//!
//! # Responsibilities
//! - Own the inbound request and the tracked response writer
//! - Hold the extracted action name and the buffered POST body
//! - Lazily parse and cache the query string
//! - Offer binding and rendering shortcuts to handlers
//!
//! # Design Decisions
//! - Contexts are pooled; `reset` touches every mutable field
//! - `reset` clears collections in place so their capacity is reused
//! - The query cache lives until the next reset, whichever request caused it

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::binding::{self, Binder};
use crate::error::{Error, Result};
use crate::http::response::{BufferedSink, ResponseWriter, TrackedWriter};
use crate::render::{self, Render};

/// Parsed query string: every value of every key, in request order.
pub type QueryValues = HashMap<String, Vec<String>>;

/// The unit of per-request state threaded through extraction, middleware
/// and handler execution.
#[derive(Debug)]
pub struct Context {
    action: String,
    request: Request<Body>,
    writer: TrackedWriter<BufferedSink>,
    buffer: Bytes,
    query: QueryValues,
    query_parsed: bool,
    remote_addr: Option<SocketAddr>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create an empty context holding a default GET request.
    pub fn new() -> Self {
        Self {
            action: String::new(),
            request: Request::default(),
            writer: TrackedWriter::new(BufferedSink::new()),
            buffer: Bytes::new(),
            query: HashMap::new(),
            query_parsed: false,
            remote_addr: None,
        }
    }

    /// Create a context already bound to `request`.
    pub fn for_request(request: Request<Body>) -> Self {
        let mut ctx = Self::new();
        ctx.attach(request, None);
        ctx
    }

    pub(crate) fn attach(&mut self, request: Request<Body>, remote_addr: Option<SocketAddr>) {
        self.request = request;
        self.remote_addr = remote_addr;
    }

    /// Return every mutable field to its empty state.
    pub fn reset(&mut self) {
        self.action.clear();
        self.request = Request::default();
        self.writer.reset(BufferedSink::new());
        self.buffer = Bytes::new();
        self.query.clear();
        self.query_parsed = false;
        self.remote_addr = None;
    }

    /// Action name extracted for this request; empty before extraction.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn set_action(&mut self, action: &str) {
        self.action.clear();
        self.action.push_str(action);
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Body> {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Raw POST body captured during action extraction; empty for GET.
    pub fn body(&self) -> &Bytes {
        &self.buffer
    }

    pub(crate) fn set_buffer(&mut self, buffer: Bytes) {
        self.buffer = buffer;
    }

    pub fn writer(&self) -> &TrackedWriter<BufferedSink> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut TrackedWriter<BufferedSink> {
        &mut self.writer
    }

    /// Transport address of the peer, when the listener provided one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Force pending headers out and move the buffered response out of the context.
    pub fn take_response(&mut self) -> Response {
        self.writer.write_header_now();
        self.writer.sink_mut().take_response()
    }

    /// Parsed query string, computed on first access.
    pub fn query(&mut self) -> &QueryValues {
        if !self.query_parsed {
            if let Some(raw) = self.request.uri().query() {
                for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                    self.query
                        .entry(key.into_owned())
                        .or_default()
                        .push(value.into_owned());
                }
            }
            self.query_parsed = true;
        }
        &self.query
    }

    /// Query string flattened to the first value of every key.
    pub fn query_map(&mut self) -> HashMap<String, String> {
        self.query()
            .iter()
            .filter_map(|(key, values)| values.first().map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// First value of query parameter `key`.
    pub fn get_query(&mut self, key: &str) -> Option<&str> {
        self.query()
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Request header value, if present and valid UTF-8.
    pub fn request_header(&self, key: &str) -> Option<&str> {
        self.request
            .headers()
            .get(key)
            .and_then(|value| value.to_str().ok())
    }

    /// Client address: `X-Forwarded-For` first hop, then `X-Real-IP`, then
    /// the transport peer. IPv6 loopback is reported as `127.0.0.1`.
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .request_header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        let real_ip = || {
            self.request_header("x-real-ip")
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        };

        let ip = match forwarded.or_else(real_ip) {
            Some(ip) => ip.to_string(),
            None => self
                .remote_addr
                .map(|addr| addr.ip().to_string())
                .unwrap_or_default(),
        };

        if ip == "::1" {
            "127.0.0.1".to_string()
        } else {
            ip
        }
    }

    /// True for a GET carrying `Connection: Upgrade` and `Upgrade: websocket`.
    pub fn is_websocket(&self) -> bool {
        let header_is = |name: &str, expected: &str| {
            self.request_header(name)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
        };

        self.request.method() == Method::GET
            && header_is("connection", "upgrade")
            && header_is("upgrade", "websocket")
    }

    /// Declared body length, if the request carried `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.request_header(header::CONTENT_LENGTH.as_str())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Media type of the request without parameters such as charset.
    pub fn content_type(&self) -> &str {
        let value = self
            .request_header(header::CONTENT_TYPE.as_str())
            .unwrap_or_default();
        match value.find(';') {
            Some(index) if index > 0 => value[..index].trim(),
            _ => value,
        }
    }

    /// Decode the request into `T`: query string for GET, JSON body for POST.
    pub async fn bind<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let method = self.request.method().clone();
        match method {
            Method::GET => self.should_bind_query().await,
            Method::POST => self.should_bind_json().await,
            other => Err(Error::UnsupportedMethod(other)),
        }
    }

    pub async fn should_bind_json<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.should_bind_with(&binding::Json).await
    }

    pub async fn should_bind_query<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.should_bind_with(&binding::Query).await
    }

    /// Decode the request into `T` with an explicit binder.
    pub async fn should_bind_with<B, T>(&mut self, binder: &B) -> Result<T>
    where
        B: Binder,
        T: DeserializeOwned + Send,
    {
        Ok(binder.bind(&mut self.request).await?)
    }

    /// Set the status and render `r` onto the response.
    ///
    /// Status codes that forbid a body only get the content type.
    pub fn render<R: Render + ?Sized>(&mut self, code: StatusCode, r: &R) -> Result<()> {
        self.writer.write_header(code);

        if !body_allowed_for_status(code) {
            r.write_content_type(&mut self.writer);
            self.writer.write_header_now();
            return Ok(());
        }

        r.render(&mut self.writer)?;
        Ok(())
    }

    /// Plain-text response.
    pub fn string(&mut self, code: StatusCode, text: impl AsRef<str>) -> Result<()> {
        self.render(code, &render::Text(text.as_ref()))
    }

    /// JSON response.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) -> Result<()> {
        self.render(code, &render::Json(data))
    }

    /// JSON response padded with the `callback` query parameter when present.
    pub fn jsonp<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) -> Result<()> {
        let callback = self.get_query("callback").unwrap_or_default().to_owned();
        if callback.is_empty() {
            return self.render(code, &render::Json(data));
        }
        self.render(
            code,
            &render::Jsonp {
                callback: &callback,
                data,
            },
        )
    }
}

fn body_allowed_for_status(code: StatusCode) -> bool {
    !(code.is_informational()
        || code == StatusCode::NO_CONTENT
        || code == StatusCode::NOT_MODIFIED)
}
