//! Accepted connections and lifecycle tracking.
//!
//! # Responsibilities
//! - Wrap an accepted stream as a buffered reader and a writer
//! - Generate unique connection IDs for tracing
//! - Count live connection lifecycles (current and peak)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Read side of a connection. Buffered so that bytes read past the request
/// head stay available to whoever owns the connection next.
pub type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Write side of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// An accepted client connection, split into its two directions.
pub struct Connection {
    pub id: ConnectionId,
    pub peer_addr: Option<SocketAddr>,
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Connection {
    /// Wrap an accepted TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        Self {
            id: ConnectionId::new(),
            peer_addr,
            reader: Box::new(BufReader::new(read_half)),
            writer: Box::new(write_half),
        }
    }

    /// Wrap any bidirectional stream, e.g. an in-memory duplex pipe.
    pub fn from_stream<S>(stream: S, peer_addr: Option<SocketAddr>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id: ConnectionId::new(),
            peer_addr,
            reader: Box::new(BufReader::new(read_half)),
            writer: Box::new(write_half),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

/// Tracks live connection lifecycles.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
    peak_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active lifecycle. Returns a guard that decrements on drop.
    pub fn track(&self, id: ConnectionId) -> ConnectionGuard {
        let now = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_count.fetch_max(now, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously active lifecycles seen so far.
    pub fn peak_count(&self) -> u64 {
        self.peak_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked lifecycle has finished.
    pub async fn wait_idle(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection lifecycle finished");
    }
}
