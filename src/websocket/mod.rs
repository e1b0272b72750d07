//! WebSocket subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → handshake.rs (validate, accept key, 101 + hijack callback)
//!     → [server writes the 101, hands the connection over]
//!     → session.rs (read loop, callbacks, sends)
//!     → decoder.rs (bytes → unmasked frames, fragment tagging)
//!     → frame.rs (opcodes, masking, header encoding)
//! ```
//!
//! # Design Decisions
//! - Server frames are never masked
//! - Protocol violations close the offending session only
//! - Pings are answered with a pong carrying the same payload

pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod session;

pub use decoder::{Decoder, Event, Fragment};
pub use frame::{MessageMode, OpCode};
pub use handshake::{accept_key, upgrade, upgrade_with_protocol};
pub use session::{Message, WebSocket};

use thiserror::Error;

/// Errors that end a WebSocket session.
#[derive(Debug, Error)]
pub enum WebSocketError {
    #[error("control frame must be final and at most 125 bytes")]
    InvalidControlFrame,

    #[error("unexpected data frame: {0}")]
    UnexpectedDataFrame(&'static str),

    #[error("reserved opcode {0:#x}")]
    ReservedOpcode(u8),

    #[error("reserved header bits set without a negotiated extension")]
    ReservedBits,

    #[error("message exceeds {0} bytes")]
    MessageTooLarge(u64),

    #[error("decoder made {0} transitions without completing a frame")]
    Watchdog(usize),

    #[error("session is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
