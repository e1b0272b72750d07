//! A WebSocket session bound to a hijacked connection.
//!
//! Callbacks are registered between the handshake and the moment the
//! server hands the connection over; the read loop picks them up when it
//! starts. `on_message` sees whole messages only: fragments are joined in
//! arrival order before delivery.

use std::future::Future;
use std::sync::{Arc, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::config::WebSocketConfig;
use crate::net::{BoxedWriter, Connection};
use crate::websocket::decoder::{Decoder, Event, Fragment};
use crate::websocket::frame::{encode_frame, MessageMode, OpCode};
use crate::websocket::WebSocketError;

/// Close status sent when the application closes the session.
const CLOSE_NORMAL: u16 = 1000;
/// Close status sent after a protocol violation.
const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// A complete data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub mode: MessageMode,
    pub data: Vec<u8>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            mode: MessageMode::Text,
            data: text.into().into_bytes(),
        }
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            mode: MessageMode::Binary,
            data: data.into(),
        }
    }

    /// The payload as UTF-8, for text messages that decode cleanly.
    pub fn as_text(&self) -> Option<&str> {
        match self.mode {
            MessageMode::Text => std::str::from_utf8(&self.data).ok(),
            MessageMode::Binary => None,
        }
    }
}

type SessionFn = Box<dyn FnOnce(WebSocket) -> BoxFuture<'static, ()> + Send>;
type MessageFn = Box<dyn FnMut(WebSocket, Message) -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct Callbacks {
    on_start: Option<SessionFn>,
    on_message: Option<MessageFn>,
    on_close: Option<SessionFn>,
}

struct Inner {
    config: WebSocketConfig,
    protocol: Option<String>,
    writer: Mutex<Option<BoxedWriter>>,
    callbacks: std::sync::Mutex<Callbacks>,
}

/// Server side of a WebSocket connection. Clones share the session.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Inner>,
}

impl WebSocket {
    pub(crate) fn new(config: WebSocketConfig, protocol: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                protocol,
                writer: Mutex::new(None),
                callbacks: std::sync::Mutex::new(Callbacks::default()),
            }),
        }
    }

    /// Negotiated subprotocol.
    pub fn protocol(&self) -> Option<&str> {
        self.inner.protocol.as_deref()
    }

    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Called once the connection is attached, before any message.
    pub fn on_start<F, Fut>(&self, callback: F)
    where
        F: FnOnce(WebSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks().on_start = Some(Box::new(move |ws| callback(ws).boxed()));
    }

    /// Called for every complete message, in arrival order.
    pub fn on_message<F, Fut>(&self, mut callback: F)
    where
        F: FnMut(WebSocket, Message) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks().on_message = Some(Box::new(move |ws, message| callback(ws, message).boxed()));
    }

    /// Called once after the session has ended, however it ended.
    pub fn on_close<F, Fut>(&self, callback: F)
    where
        F: FnOnce(WebSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks().on_close = Some(Box::new(move |ws| callback(ws).boxed()));
    }

    pub async fn send_text(&self, text: &str) -> Result<(), WebSocketError> {
        self.send_frame(OpCode::Text, text.as_bytes()).await
    }

    pub async fn send_binary(&self, data: &[u8]) -> Result<(), WebSocketError> {
        self.send_frame(OpCode::Binary, data).await
    }

    pub async fn send(&self, message: &Message) -> Result<(), WebSocketError> {
        self.send_frame(message.mode.opcode(), &message.data).await
    }

    /// Send a normal close frame and shut the write side. Further sends
    /// fail with [`WebSocketError::Closed`].
    pub async fn close(&self) -> Result<(), WebSocketError> {
        self.finish(&CLOSE_NORMAL.to_be_bytes()).await
    }

    async fn send_frame(&self, opcode: OpCode, payload: &[u8]) -> Result<(), WebSocketError> {
        let frame = encode_frame(opcode, payload, None);
        let mut slot = self.inner.writer.lock().await;
        let writer = slot.as_mut().ok_or(WebSocketError::Closed)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Write a close frame carrying `payload`, then shut the write side.
    async fn finish(&self, payload: &[u8]) -> Result<(), WebSocketError> {
        let mut writer = self
            .inner
            .writer
            .lock()
            .await
            .take()
            .ok_or(WebSocketError::Closed)?;
        writer.write_all(&encode_frame(OpCode::Close, payload, None)).await?;
        writer.shutdown().await?;
        Ok(())
    }

    /// Take over `connection` and run the read loop on a new task.
    pub fn attach(&self, connection: Connection) {
        tokio::spawn(self.clone().run(connection));
    }

    async fn run(self, connection: Connection) {
        let Connection {
            id,
            mut reader,
            writer,
            ..
        } = connection;
        *self.inner.writer.lock().await = Some(writer);

        let Callbacks {
            on_start,
            mut on_message,
            on_close,
        } = std::mem::take(&mut *self.callbacks());

        tracing::debug!(connection_id = %id, "WebSocket session started");
        if let Some(on_start) = on_start {
            on_start(self.clone()).await;
        }

        let mut decoder = Decoder::new(&self.inner.config);
        let mut chunk = vec![0u8; self.inner.config.read_chunk_bytes.max(1)];
        let mut partial: Option<Message> = None;

        let outcome = 'session: loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(WebSocketError::Io(e)),
            };

            let mut events = Vec::new();
            let fed = decoder.feed(&chunk[..read], |event| events.push(event));

            for event in events {
                match event {
                    Event::Data(fragment) => {
                        let Some(message) = reassemble(&mut partial, fragment) else {
                            continue;
                        };
                        if let Some(on_message) = on_message.as_mut() {
                            on_message(self.clone(), message).await;
                        }
                    }
                    Event::Ping(payload) => {
                        if let Err(e) = self.send_frame(OpCode::Pong, &payload).await {
                            break 'session Err(e);
                        }
                    }
                    Event::Pong(_) => {
                        tracing::trace!(connection_id = %id, "Pong received");
                    }
                    Event::Close(payload) => {
                        tracing::debug!(connection_id = %id, "Peer closed WebSocket");
                        // Echo the status code, if any, as the protocol asks.
                        let _ = self.finish(&payload[..payload.len().min(2)]).await;
                        break 'session Ok(());
                    }
                }
            }

            if let Err(e) = fed {
                break Err(e);
            }
        };

        match outcome {
            Ok(()) | Err(WebSocketError::Closed) => {
                tracing::debug!(connection_id = %id, "WebSocket session ended");
            }
            Err(WebSocketError::Io(e)) => {
                tracing::debug!(connection_id = %id, error = %e, "WebSocket transport error");
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "WebSocket protocol violation, closing session");
                let _ = self.finish(&CLOSE_PROTOCOL_ERROR.to_be_bytes()).await;
            }
        }

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(on_close) = on_close {
            on_close(self.clone()).await;
        }
    }
}

/// Join fragments into whole messages.
fn reassemble(partial: &mut Option<Message>, fragment: Fragment) -> Option<Message> {
    if !fragment.fragmented {
        return Some(Message {
            mode: fragment.mode,
            data: fragment.data,
        });
    }

    let message = partial.get_or_insert_with(|| Message {
        mode: fragment.mode,
        data: Vec::new(),
    });
    message.data.extend_from_slice(&fragment.data);

    if fragment.last {
        partial.take()
    } else {
        None
    }
}

impl std::fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket")
            .field("protocol", &self.inner.protocol)
            .finish_non_exhaustive()
    }
}
