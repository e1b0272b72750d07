//! Responses produced by handlers.
//!
//! A response is built by application or handshake code and consumed
//! exactly once by the connection's write path. Instead of a body it may
//! carry a hijack callback, which takes over the connection after the
//! response head has been sent.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::http::error::HandlerError;
use crate::http::header::{HeaderKind, HeaderStore};
use crate::http::status::{StatusCode, UnknownStatus};
use crate::net::Connection;

/// Value of the `server` header set by [`Response::add_standard_headers`].
pub const SERVER_NAME: &str = concat!("hitch/", env!("CARGO_PKG_VERSION"));

/// Produces a body part at the moment it is written.
pub type Producer = Box<dyn FnOnce() -> Result<Vec<u8>, HandlerError> + Send>;

/// Receives the connection once the response head has been written.
pub type HijackFn = Box<dyn FnOnce(Connection) + Send>;

pub enum BodyPart {
    Bytes(Vec<u8>),
    Deferred(Producer),
}

impl BodyPart {
    pub fn deferred<F>(produce: F) -> Self
    where
        F: FnOnce() -> Result<Vec<u8>, HandlerError> + Send + 'static,
    {
        BodyPart::Deferred(Box::new(produce))
    }
}

impl From<Vec<u8>> for BodyPart {
    fn from(bytes: Vec<u8>) -> Self {
        BodyPart::Bytes(bytes)
    }
}

impl From<String> for BodyPart {
    fn from(text: String) -> Self {
        BodyPart::Bytes(text.into_bytes())
    }
}

impl From<&str> for BodyPart {
    fn from(text: &str) -> Self {
        BodyPart::Bytes(text.as_bytes().to_vec())
    }
}

/// Response body.
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    /// A single in-memory payload; its length is known up front.
    Bytes(Vec<u8>),
    /// A sequence of parts written in order; the total length is unknown.
    Parts(Vec<BodyPart>),
}

impl Body {
    pub fn parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<BodyPart>,
    {
        Body::Parts(parts.into_iter().map(Into::into).collect())
    }

    /// Length when it can be known without producing any part.
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Body::Bytes(bytes) => Some(bytes.len()),
            Body::Empty | Body::Parts(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(text.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Bytes(text.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Body::Parts(parts) => write!(f, "Parts({} parts)", parts.len()),
        }
    }
}

pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderStore,
    body: Body,
    hijack: Option<HijackFn>,
}

impl Response {
    /// An empty `200 OK`.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderStore::new(HeaderKind::Response),
            body: Body::Empty,
            hijack: None,
        }
    }

    /// A plain-text response for `status` with standard and no-cache headers.
    ///
    /// The body is `payload`, or `"<code> <reason>"` when none is given.
    pub fn generic(status: impl Into<StatusCode>, payload: Option<String>) -> Self {
        let status = status.into();
        let body = payload
            .unwrap_or_else(|| format!("{} {}", status, status.reason().unwrap_or_default()));

        let mut response = Self::new().with_status(status).with_body(body);
        response.add_standard_headers();
        response.no_cache();
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: impl Into<StatusCode>) {
        self.status = status.into();
    }

    /// Set the status from a symbolic name such as `not_found`.
    pub fn set_status_name(&mut self, name: &str) -> Result<(), UnknownStatus> {
        self.status = name.parse()?;
        Ok(())
    }

    pub fn with_status(mut self, status: impl Into<StatusCode>) -> Self {
        self.set_status(status);
        self
    }

    /// Reason sentence for the status line: the override if set, else the
    /// table entry, else empty.
    pub fn reason(&self) -> &str {
        match &self.reason {
            Some(reason) => reason.as_str(),
            None => self.status.reason().unwrap_or_default(),
        }
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderStore {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.set_body(body);
        self
    }

    /// Hand the connection to `hijack` once this response has been sent.
    pub fn set_hijack<F>(&mut self, hijack: F)
    where
        F: FnOnce(Connection) + Send + 'static,
    {
        self.hijack = Some(Box::new(hijack));
    }

    pub fn is_hijack(&self) -> bool {
        self.hijack.is_some()
    }

    /// Split into the parts the write path consumes.
    pub(crate) fn into_parts(self) -> (ResponseHead, Body, Option<HijackFn>) {
        let reason = self.reason().to_string();
        (
            ResponseHead {
                status: self.status,
                reason,
                headers: self.headers,
            },
            self.body,
            self.hijack,
        )
    }

    /// Set `date` to now and `server` to this crate's name and version.
    pub fn add_standard_headers(&mut self) {
        self.set_header("date", httpdate::fmt_http_date(SystemTime::now()));
        self.set_header("server", SERVER_NAME);
    }

    /// Mark the response as not cacheable.
    pub fn no_cache(&mut self) {
        self.set_header("expires", httpdate::fmt_http_date(UNIX_EPOCH));
        self.set_header("cache-control", "private, no-store, no-cache");
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason())
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("hijack", &self.hijack.is_some())
            .finish()
    }
}

/// Status line and headers of a response about to be written.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderStore,
}
