//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address with a bounded backlog
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//!
//! Accepting never waits on the semaphore. Each accepted connection comes
//! with a [`SlotRequest`] that its task awaits before the lifecycle body
//! starts, so the accept loop stays live while execution is saturated.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
    /// The slot semaphore was closed.
    Closed,
    /// The accept loop task failed.
    Task(tokio::task::JoinError),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Connection limiter closed"),
            ListenerError::Task(e) => write!(f, "Server task failed: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bounded TCP listener that limits concurrent connection lifecycles.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Bind)?;
        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;
        socket.bind(addr).map_err(ListenerError::Bind)?;
        let listener = socket.listen(config.backlog).map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection without waiting for capacity.
    ///
    /// The returned [`SlotRequest`] must be redeemed before the connection
    /// is processed.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, SlotRequest), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((
            stream,
            addr,
            SlotRequest {
                limit: Arc::clone(&self.connection_limit),
            },
        ))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A claim on a future connection slot.
#[derive(Debug)]
pub struct SlotRequest {
    limit: Arc<Semaphore>,
}

impl SlotRequest {
    /// Wait until a slot is free and take it.
    pub async fn acquire(self) -> Result<ConnectionPermit, ListenerError> {
        let permit = self
            .limit
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;
        Ok(ConnectionPermit { _permit: permit })
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool, on
/// every exit path including a panicking handler.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local_config(max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            backlog: 8,
            max_connections,
        }
    }

    #[tokio::test]
    async fn accept_does_not_wait_for_capacity() {
        let listener = Listener::bind(&local_config(1)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let _c2 = TcpStream::connect(addr).await.unwrap();

        let (_s1, _, slot1) = listener.accept().await.unwrap();
        let _permit1 = slot1.acquire().await.unwrap();
        assert_eq!(listener.available_permits(), 0);

        // The second accept completes even though no slot is free.
        let (_s2, _, slot2) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), slot2.acquire()).await;
        assert!(pending.is_err(), "slot must not be granted while saturated");
    }

    #[tokio::test]
    async fn dropping_permit_frees_slot() {
        let listener = Listener::bind(&local_config(1)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _c1 = TcpStream::connect(addr).await.unwrap();
        let _c2 = TcpStream::connect(addr).await.unwrap();

        let (_s1, _, slot1) = listener.accept().await.unwrap();
        let (_s2, _, slot2) = listener.accept().await.unwrap();

        let permit1 = slot1.acquire().await.unwrap();
        let waiter = tokio::spawn(slot2.acquire());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit1);
        let permit2 = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(permit2.is_ok());
        assert_eq!(listener.max_connections(), 1);
    }

    #[tokio::test]
    async fn rejects_bad_address() {
        let config = ListenerConfig {
            bind_address: "nope".into(),
            ..local_config(1)
        };
        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind(_))
        ));
    }
}
