//! Streaming frame decoder.
//!
//! Bytes are fed in chunks of any size. Every frame that can be completed
//! from the buffered bytes is decoded before `feed` returns; a partial frame
//! stays buffered until more bytes arrive.
//!
//! # States
//! ```text
//! Initial ──(2 bytes)──▶ ReadingHeader ──(header)──▶ ReadingData
//!    ▲                                                    │
//!    └─────────────────────(payload)──────────────────────┘
//! Close frame or protocol error ──▶ Closed (terminal)
//! ```

use crate::config::WebSocketConfig;
use crate::websocket::frame::{apply_mask, MessageMode, OpCode};
use crate::websocket::WebSocketError;

/// Largest payload a control frame may carry.
const MAX_CONTROL_PAYLOAD: u64 = 125;

/// One decoded data frame.
///
/// `fragmented` is set for every frame of a multi-frame message; `last`
/// marks the final frame of such a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub data: Vec<u8>,
    pub mode: MessageMode,
    pub fragmented: bool,
    pub last: bool,
}

/// Something the decoder observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Data(Fragment),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// Close frame payload (status code and reason, possibly empty).
    Close(Vec<u8>),
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    fin: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Initial,
    ReadingHeader { header_len: usize },
    ReadingData(FrameHeader),
    Closed,
}

enum Progress {
    /// Moved to another state, no frame finished yet.
    Advanced,
    /// A frame finished.
    Completed,
    /// Not enough buffered bytes.
    NeedMore,
}

#[derive(Debug)]
pub struct Decoder {
    state: State,
    buffer: Vec<u8>,
    /// Start of unconsumed bytes in `buffer`.
    pos: usize,
    watchdog_limit: usize,
    max_message_bytes: u64,
    fragmented: bool,
    fragmented_size: u64,
    mode: MessageMode,
}

impl Decoder {
    pub fn new(config: &WebSocketConfig) -> Self {
        Self {
            state: State::Initial,
            buffer: Vec::new(),
            pos: 0,
            watchdog_limit: config.watchdog_iterations,
            max_message_bytes: config.max_message_bytes,
            fragmented: false,
            fragmented_size: 0,
            mode: MessageMode::Text,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Number of buffered bytes not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Buffer `bytes` and decode every complete frame, handing each event
    /// to `sink` in wire order.
    ///
    /// Any error is terminal: the decoder is closed and later calls fail
    /// with [`WebSocketError::Closed`].
    pub fn feed<F>(&mut self, bytes: &[u8], mut sink: F) -> Result<(), WebSocketError>
    where
        F: FnMut(Event),
    {
        if self.is_closed() {
            return Err(WebSocketError::Closed);
        }
        self.buffer.extend_from_slice(bytes);

        let mut transitions = 0;
        let result = loop {
            match self.step(&mut sink) {
                Ok(Progress::NeedMore) => break Ok(()),
                Ok(Progress::Completed) => transitions = 0,
                Ok(Progress::Advanced) => {
                    transitions += 1;
                    if transitions > self.watchdog_limit {
                        break Err(WebSocketError::Watchdog(transitions));
                    }
                }
                Err(e) => break Err(e),
            }
        };

        if result.is_err() {
            self.close();
        } else {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
        result
    }

    fn close(&mut self) {
        self.state = State::Closed;
        self.buffer = Vec::new();
        self.pos = 0;
        self.fragmented = false;
        self.fragmented_size = 0;
    }

    /// The single transition function.
    fn step<F>(&mut self, sink: &mut F) -> Result<Progress, WebSocketError>
    where
        F: FnMut(Event),
    {
        let pending = &self.buffer[self.pos..];

        match self.state {
            State::Initial => {
                if pending.len() < 2 {
                    return Ok(Progress::NeedMore);
                }
                let masked = pending[1] & 0x80 != 0;
                let extended = match pending[1] & 0x7F {
                    126 => 2,
                    127 => 8,
                    _ => 0,
                };
                let header_len = 2 + extended + if masked { 4 } else { 0 };
                self.state = State::ReadingHeader { header_len };
                Ok(Progress::Advanced)
            }

            State::ReadingHeader { header_len } => {
                if pending.len() < header_len {
                    return Ok(Progress::NeedMore);
                }
                let (fin, opcode, declared_len, mask) = parse_header(&pending[..header_len])?;
                let payload_len = self.admit(fin, opcode, declared_len)?;
                self.pos += header_len;

                tracing::trace!(?opcode, len = payload_len, fin, fragmented = self.fragmented, "Frame header");

                self.state = State::ReadingData(FrameHeader {
                    fin,
                    opcode,
                    mask,
                    payload_len,
                });
                Ok(Progress::Advanced)
            }

            State::ReadingData(header) => {
                if pending.len() < header.payload_len {
                    return Ok(Progress::NeedMore);
                }
                let mut payload = pending[..header.payload_len].to_vec();
                self.pos += header.payload_len;
                if let Some(mask) = header.mask {
                    apply_mask(&mut payload, mask);
                }
                self.state = State::Initial;

                match header.opcode {
                    OpCode::Close => {
                        sink(Event::Close(payload));
                        self.close();
                    }
                    OpCode::Ping => sink(Event::Ping(payload)),
                    OpCode::Pong => sink(Event::Pong(payload)),
                    OpCode::Continuation | OpCode::Text | OpCode::Binary => {
                        let fragmented = self.fragmented;
                        sink(Event::Data(Fragment {
                            data: payload,
                            mode: self.mode,
                            fragmented,
                            last: fragmented && header.fin,
                        }));
                        if header.fin {
                            self.fragmented = false;
                            self.fragmented_size = 0;
                        }
                    }
                }
                Ok(Progress::Completed)
            }

            State::Closed => Ok(Progress::NeedMore),
        }
    }

    /// Check a frame against the fragmentation state and update it.
    /// Returns the payload length to wait for.
    fn admit(&mut self, fin: bool, opcode: OpCode, declared_len: u64) -> Result<usize, WebSocketError> {
        if opcode.is_control() {
            if !fin || declared_len > MAX_CONTROL_PAYLOAD {
                return Err(WebSocketError::InvalidControlFrame);
            }
            return Ok(declared_len as usize);
        }

        match opcode {
            OpCode::Continuation if !self.fragmented => {
                return Err(WebSocketError::UnexpectedDataFrame(
                    "continuation without a fragmented message",
                ));
            }
            OpCode::Text | OpCode::Binary if self.fragmented => {
                return Err(WebSocketError::UnexpectedDataFrame(
                    "new message inside a fragmented message",
                ));
            }
            _ => {}
        }

        let previous = if self.fragmented { self.fragmented_size } else { 0 };
        let total = previous.saturating_add(declared_len);
        if total > self.max_message_bytes {
            return Err(WebSocketError::MessageTooLarge(self.max_message_bytes));
        }
        let payload_len = usize::try_from(declared_len)
            .map_err(|_| WebSocketError::MessageTooLarge(self.max_message_bytes))?;

        match opcode {
            OpCode::Text => self.mode = MessageMode::Text,
            OpCode::Binary => self.mode = MessageMode::Binary,
            _ => {}
        }
        if !self.fragmented && !fin {
            self.fragmented = true;
        }
        if self.fragmented {
            self.fragmented_size = total;
        }
        Ok(payload_len)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&WebSocketConfig::default())
    }
}

/// Decode FIN, opcode, declared length and mask from a complete header.
fn parse_header(bytes: &[u8]) -> Result<(bool, OpCode, u64, Option<[u8; 4]>), WebSocketError> {
    let (b0, b1) = (bytes[0], bytes[1]);
    if b0 & 0x70 != 0 {
        return Err(WebSocketError::ReservedBits);
    }
    let fin = b0 & 0x80 != 0;
    let opcode = OpCode::from_u8(b0 & 0x0F)?;

    let (declared_len, offset) = match b1 & 0x7F {
        126 => (u64::from(u16::from_be_bytes([bytes[2], bytes[3]])), 4),
        127 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[2..10]);
            (u64::from_be_bytes(raw), 10)
        }
        len => (u64::from(len), 2),
    };

    let mask = if b1 & 0x80 != 0 {
        let mut key = [0u8; 4];
        key.copy_from_slice(&bytes[offset..offset + 4]);
        Some(key)
    } else {
        None
    };

    Ok((fin, opcode, declared_len, mask))
}
