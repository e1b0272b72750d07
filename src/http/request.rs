//! Parsed HTTP requests.
//!
//! A request is created once per connection after the head has been read.
//! Everything but the body is fixed from then on; the body stays on the
//! socket until a handler asks for it, and can be read at most once.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::http::error::{HttpError, MissingHeader};
use crate::http::header::{HeaderKind, HeaderStore};
use crate::net::{BoxedReader, ConnectionId};

/// Port assumed when the `host` header carries none.
const DEFAULT_PORT: u16 = 443;

/// Request line and headers as read off the wire.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub verb: String,
    pub path: String,
    pub protocol: String,
    pub headers: HeaderStore,
}

impl RequestHead {
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into().to_ascii_uppercase(),
            path: path.into(),
            protocol: "HTTP/1.1".to_string(),
            headers: HeaderStore::new(HeaderKind::Request),
        }
    }
}

/// Bounds applied by [`Request::read_full_body`].
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_bytes: usize,
    pub read_timeout: Duration,
}

impl BodyLimits {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_bytes: config.limits.max_body_bytes,
            read_timeout: config.timeouts.body_read(),
        }
    }
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

struct BodySource {
    reader: Option<BoxedReader>,
    consumed: bool,
}

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    /// Accumulated from a key ending in `[]`, in encounter order.
    List(Vec<String>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Single(v) => Some(v),
            QueryValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            QueryValue::Single(_) => None,
            QueryValue::List(v) => Some(v),
        }
    }
}

/// An incoming request bound to its connection.
///
/// Cloning is cheap and every clone shares the same body source.
#[derive(Clone)]
pub struct Request {
    head: Arc<RequestHead>,
    peer_addr: Option<SocketAddr>,
    connection_id: ConnectionId,
    body: Arc<Mutex<BodySource>>,
    limits: BodyLimits,
}

impl Request {
    pub fn new(
        head: RequestHead,
        connection_id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        reader: BoxedReader,
        limits: BodyLimits,
    ) -> Self {
        Self {
            head: Arc::new(head),
            peer_addr,
            connection_id,
            body: Arc::new(Mutex::new(BodySource {
                reader: Some(reader),
                consumed: false,
            })),
            limits,
        }
    }

    /// A request that is not attached to any socket; its body is empty.
    pub fn detached(head: RequestHead) -> Self {
        Self::new(
            head,
            ConnectionId::new(),
            None,
            Box::new(tokio::io::empty()),
            BodyLimits::default(),
        )
    }

    /// Take the connection's read side back once dispatch is over.
    pub(crate) async fn reclaim_reader(&self) -> Option<BoxedReader> {
        self.body.lock().await.reader.take()
    }

    pub fn verb(&self) -> &str {
        &self.head.verb
    }

    /// Raw request target, query included.
    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn protocol(&self) -> &str {
        &self.head.protocol
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.head.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)
    }

    pub fn required_header(&self, name: &str) -> Result<&str, MissingHeader> {
        self.head.headers.get_required(name)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Host name from the `host` header, without the port.
    pub fn host(&self) -> Option<&str> {
        let host = self.header("host")?;
        Some(host.split(':').next().unwrap_or(host))
    }

    /// Port from the `host` header; 443 when the header names none.
    pub fn port(&self) -> Option<u16> {
        let host = self.header("host")?;
        match host.split_once(':') {
            Some((_, port)) => port.parse().ok(),
            None => Some(DEFAULT_PORT),
        }
    }

    /// Path without its query component.
    pub fn path_info(&self) -> &str {
        match self.head.path.split_once('?') {
            Some((path, _)) => path,
            None => &self.head.path,
        }
    }

    pub fn query_string(&self) -> Option<&str> {
        self.head.path.split_once('?').map(|(_, query)| query)
    }

    /// Decoded query parameters.
    ///
    /// A key ending in `[]` accumulates its values into a list stored under
    /// the key without the suffix. Any other repeated key keeps the last value.
    pub fn query_params(&self) -> HashMap<String, QueryValue> {
        let mut params = HashMap::new();
        let Some(query) = self.query_string() else {
            return params;
        };

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match name.strip_suffix("[]") {
                Some(base) if !base.is_empty() => {
                    let entry = params
                        .entry(base.to_string())
                        .or_insert_with(|| QueryValue::List(Vec::new()));
                    match entry {
                        QueryValue::List(values) => values.push(value),
                        single => *single = QueryValue::List(vec![value]),
                    }
                }
                _ => {
                    params.insert(name.to_string(), QueryValue::Single(value));
                }
            }
        }

        params
    }

    /// Whether the headers announce a body.
    pub fn has_body(&self) -> bool {
        self.head.headers.contains("transfer-encoding") || self.head.headers.contains("content-length")
    }

    pub fn verb_allows_body(&self) -> bool {
        matches!(self.verb(), "POST" | "PUT" | "PATCH")
    }

    fn content_length(&self) -> Result<Option<usize>, HttpError> {
        match self.header("content-length") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| HttpError::InvalidContentLength(raw.to_string())),
            None => Ok(None),
        }
    }

    /// Read the whole body from the connection.
    ///
    /// Reads exactly `content-length` bytes when the header is present,
    /// otherwise until the peer stops sending. Either way the body is
    /// capped by the configured limit. A second call fails.
    pub async fn read_full_body(&self) -> Result<Vec<u8>, HttpError> {
        let content_length = self.content_length()?;
        let max = self.limits.max_bytes;

        let mut source = self.body.lock().await;
        if source.consumed {
            return Err(HttpError::BodyAlreadyRead);
        }
        source.consumed = true;
        let reader = source.reader.as_mut().ok_or(HttpError::BodyAlreadyRead)?;

        let read = async move {
            match content_length {
                Some(len) if len > max => Err(HttpError::BodyTooLarge(max)),
                Some(len) => {
                    let mut body = Vec::with_capacity(len);
                    reader.take(len as u64).read_to_end(&mut body).await?;
                    if body.len() < len {
                        return Err(HttpError::UnexpectedEof);
                    }
                    Ok(body)
                }
                None => {
                    let mut body = Vec::new();
                    reader.take(max as u64 + 1).read_to_end(&mut body).await?;
                    if body.len() > max {
                        return Err(HttpError::BodyTooLarge(max));
                    }
                    Ok(body)
                }
            }
        };

        tokio::time::timeout(self.limits.read_timeout, read)
            .await
            .map_err(|_| HttpError::Timeout)?
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("verb", &self.head.verb)
            .field("path", &self.head.path)
            .field("protocol", &self.head.protocol)
            .field("headers", &self.head.headers)
            .field("peer_addr", &self.peer_addr)
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}
