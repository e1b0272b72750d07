//! HTTP server: accept loop and per-connection lifecycle.
//!
//! # Responsibilities
//! - Accept connections without stalling behind capacity
//! - Run each lifecycle on its own task once a slot is free
//! - Parse the request head, dispatch through the responder chain
//! - Turn handler errors and panics into a 500
//! - Write the response, then close or hand the connection off
//!
//! # Connection lifecycle
//! ```text
//! accept → acquire slot → read head → dispatch → write response
//!     → hijack callback (connection handed off)
//!     → or shutdown write side
//! → release slot
//! ```
//!
//! One request per connection: there is no keep-alive.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::http::codec;
use crate::http::error::WriteError;
use crate::http::request::{BodyLimits, Request};
use crate::http::responder::ResponderChain;
use crate::http::response::Response;
use crate::http::status::StatusCode;
use crate::net::{BoxedWriter, Connection, ConnectionTracker, Listener, ListenerError};

struct ServerInner {
    config: ServerConfig,
    responders: ResponderChain,
    tracker: ConnectionTracker,
}

/// HTTP/1.1 server. Cloning shares the same responders and tracker.
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<ServerInner>,
}

impl HttpServer {
    /// Create a server dispatching through `responders`.
    pub fn new(config: ServerConfig, responders: ResponderChain) -> Self {
        Self::with_tracker(config, responders, ConnectionTracker::new())
    }

    /// Create a server that records lifecycles in a shared `tracker`, so
    /// responders can report on it.
    pub fn with_tracker(
        config: ServerConfig,
        responders: ResponderChain,
        tracker: ConnectionTracker,
    ) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                responders,
                tracker,
            }),
        }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Live and peak connection lifecycle counts.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.inner.tracker
    }

    /// Accept connections until `shutdown` fires, then wait for in-flight
    /// lifecycles to finish.
    pub async fn run(
        &self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr, slot) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let server = self.clone();
                    tokio::spawn(async move {
                        let _permit = match slot.acquire().await {
                            Ok(permit) => permit,
                            Err(e) => {
                                tracing::warn!(peer_addr = %peer_addr, error = %e, "No connection slot");
                                return;
                            }
                        };
                        let mut connection = Connection::from_tcp(stream);
                        connection.peer_addr.get_or_insert(peer_addr);
                        server.serve_connection(connection).await;
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        self.inner.tracker.wait_idle().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run one connection's lifecycle to completion.
    ///
    /// Malformed requests drop the connection without a response. Once a
    /// response is written the connection is either handed to the
    /// response's hijack callback or closed.
    pub async fn serve_connection(&self, connection: Connection) {
        let _guard = self.inner.tracker.track(connection.id);
        let Connection {
            id,
            peer_addr,
            mut reader,
            mut writer,
        } = connection;
        let config = &self.inner.config;

        let head = tokio::time::timeout(
            config.timeouts.header_read(),
            codec::read_request_head(&mut reader, config.limits.max_line_bytes),
        )
        .await;
        let head = match head {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => {
                tracing::warn!(connection_id = %id, error = %e, "Malformed request, dropping connection");
                return;
            }
            Err(_) => {
                tracing::warn!(connection_id = %id, "Timed out reading request head, dropping connection");
                return;
            }
        };

        tracing::debug!(
            connection_id = %id,
            verb = %head.verb,
            path = %head.path,
            "Request received"
        );

        let request = Request::new(head, id, peer_addr, reader, BodyLimits::from_config(config));
        let response = self.dispatch(&request).await;

        let (head, body, hijack) = response.into_parts();
        let status = head.status;
        let written = AssertUnwindSafe(codec::write_response(&mut writer, &head, body))
            .catch_unwind()
            .await;

        let written = match written {
            Ok(Ok(())) => true,
            Ok(Err(WriteError::Io(e))) => {
                tracing::debug!(connection_id = %id, error = %e, "Peer went away before response was written");
                false
            }
            Ok(Err(WriteError::Producer(e))) => {
                tracing::error!(connection_id = %id, error = %e, "Deferred body part failed");
                write_internal_error(&mut writer).await;
                false
            }
            Err(panic) => {
                tracing::error!(connection_id = %id, panic = %panic_message(&*panic), "Deferred body part panicked");
                write_internal_error(&mut writer).await;
                false
            }
        };

        tracing::info!(
            connection_id = %id,
            verb = %request.verb(),
            path = %request.path(),
            status = status.as_u16(),
            "Request served"
        );

        if let Some(hijack) = hijack.filter(|_| written) {
            match request.reclaim_reader().await {
                Some(reader) => {
                    tracing::debug!(connection_id = %id, "Connection hijacked");
                    let connection = Connection {
                        id,
                        peer_addr,
                        reader,
                        writer,
                    };
                    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| hijack(connection))) {
                        tracing::error!(connection_id = %id, panic = %panic_message(&*panic), "Hijack callback panicked");
                    }
                    return;
                }
                None => {
                    tracing::warn!(connection_id = %id, "Read side no longer available, cannot hijack");
                }
            }
        }

        let _ = writer.shutdown().await;
    }

    /// Run the responder chain, mapping errors and panics to a 500.
    async fn dispatch(&self, request: &Request) -> Response {
        let outcome = AssertUnwindSafe(self.inner.responders.dispatch(request.clone()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(
                    connection_id = %request.connection_id(),
                    path = %request.path(),
                    error = %e,
                    "Handler failed"
                );
                Response::generic(StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            Err(panic) => {
                tracing::error!(
                    connection_id = %request.connection_id(),
                    path = %request.path(),
                    panic = %panic_message(&*panic),
                    "Handler panicked"
                );
                Response::generic(StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        }
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("config", &self.inner.config)
            .field("responders", &self.inner.responders)
            .finish()
    }
}

/// Best effort: part of a response may already be on the wire, and the
/// peer may be gone.
async fn write_internal_error(writer: &mut BoxedWriter) {
    let (head, body, _) = Response::generic(StatusCode::INTERNAL_SERVER_ERROR, None).into_parts();
    if let Err(e) = codec::write_response(writer, &head, body).await {
        tracing::debug!(error = %e, "Could not deliver 500");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::HandlerError;
    use crate::http::response::{Body, BodyPart};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, DuplexStream};

    type Answer = Result<Option<Response>, HandlerError>;

    fn server(responders: ResponderChain) -> HttpServer {
        HttpServer::new(ServerConfig::default(), responders)
    }

    /// Serve one in-memory connection and return everything written back.
    async fn exchange(server: &HttpServer, raw: &[u8]) -> String {
        let (mut client, far_end): (DuplexStream, DuplexStream) = tokio::io::duplex(64 * 1024);
        client.write_all(raw).await.unwrap();

        let task = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .serve_connection(Connection::from_stream(far_end, None))
                    .await
            })
        };

        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut out))
            .await
            .unwrap()
            .unwrap();
        task.await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn serves_hello_world() {
        let server = server(ResponderChain::new().with(|req: Request| async move {
            let params = req.query_params();
            let world = params
                .get("world")
                .and_then(|v| v.as_str())
                .unwrap_or("Earth")
                .to_string();
            Answer::Ok(Some(
                Response::new()
                    .with_header("content-type", "text/plain")
                    .with_body(format!("hello from {world}!")),
            ))
        }));

        let out = exchange(&server, b"GET /hello-world?world=Mars HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.contains("content-length: 16\r\n"), "{out}");
        assert!(out.contains("connection: close\r\n"), "{out}");
        assert!(out.ends_with("\r\n\r\nhello from Mars!"), "{out}");
        assert_eq!(server.tracker().active_count(), 0);
    }

    #[tokio::test]
    async fn unmatched_requests_get_404() {
        let out = exchange(&server(ResponderChain::new()), b"GET /nope HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"), "{out}");
        assert!(out.ends_with("404 Not Found"), "{out}");
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let server = server(ResponderChain::new().with(|_req: Request| async {
            Answer::Err("database on fire".into())
        }));
        let out = exchange(&server, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{out}");
    }

    #[tokio::test]
    async fn handler_panic_becomes_500() {
        let server = server(ResponderChain::new().with(|req: Request| async move {
            if req.path() == "/" {
                panic!("handler blew up");
            }
            Answer::Ok(None)
        }));
        let out = exchange(&server, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{out}");
        assert_eq!(server.tracker().active_count(), 0);
    }

    #[tokio::test]
    async fn failing_deferred_part_appends_500() {
        let server = server(ResponderChain::new().with(|_req: Request| async {
            Answer::Ok(Some(Response::new().with_body(Body::Parts(vec![
                BodyPart::from("partial"),
                BodyPart::deferred(|| Err("gone".into())),
            ]))))
        }));
        let out = exchange(&server, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.contains("partialHTTP/1.1 500 Internal Server Error\r\n"), "{out}");
    }

    #[tokio::test]
    async fn malformed_request_gets_no_response() {
        let out = exchange(&server(ResponderChain::new()), b"NONSENSE\r\n\r\n").await;
        assert!(out.is_empty(), "{out}");
    }

    #[tokio::test]
    async fn handler_reads_body() {
        let server = server(ResponderChain::new().with(|req: Request| async move {
            let body = req.read_full_body().await?;
            Answer::Ok(Some(Response::new().with_body(body)))
        }));
        let out = exchange(&server, b"POST /echo HTTP/1.1\r\ncontent-length: 5\r\n\r\nhello").await;
        assert!(out.ends_with("content-length: 5\r\nconnection: close\r\n\r\nhello"), "{out}");
    }

    #[tokio::test]
    async fn hijack_receives_connection_with_buffered_bytes() {
        let server = server(ResponderChain::new().with(|_req: Request| async {
            let mut response = Response::new().with_status(StatusCode::SWITCHING_PROTOCOLS);
            response.set_header("connection", "Upgrade");
            response.set_hijack(|mut connection: Connection| {
                tokio::spawn(async move {
                    let mut early = [0u8; 5];
                    connection.reader.read_exact(&mut early).await.unwrap();
                    connection.writer.write_all(b"[").await.unwrap();
                    connection.writer.write_all(&early).await.unwrap();
                    connection.writer.write_all(b"]").await.unwrap();
                    connection.writer.shutdown().await.unwrap();
                });
            });
            Answer::Ok(Some(response))
        }));

        let out = exchange(&server, b"GET /up HTTP/1.1\r\n\r\nearly").await;
        assert!(out.starts_with("HTTP/1.1 101 Switching Protocols\r\nconnection: Upgrade\r\n\r\n"), "{out}");
        assert!(out.ends_with("[early]"), "{out}");
        assert!(!out.contains("connection: close"), "{out}");
    }
}
