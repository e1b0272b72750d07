//! Frame-level primitives shared by the decoder and the session.
//!
//! ```text
//!  0               1               2               3
//!  F R R R opcode  M len7          extended length (0, 2 or 8 bytes)
//!  masking key (0 or 4 bytes)      payload ...
//! ```

use crate::websocket::WebSocketError;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_u8(raw: u8) -> Result<Self, WebSocketError> {
        match raw {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(WebSocketError::ReservedOpcode(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    /// Control opcodes have bit 3 set.
    pub fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }
}

/// Whether a data message carries text or binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageMode {
    Text,
    Binary,
}

impl MessageMode {
    pub fn opcode(self) -> OpCode {
        match self {
            MessageMode::Text => OpCode::Text,
            MessageMode::Binary => OpCode::Binary,
        }
    }
}

/// XOR `data` in place with the 4-byte key. Applying it twice restores
/// the input.
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Encode a final frame. `mask` is only set when acting as a client.
pub fn encode_frame(opcode: OpCode, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let len = payload.len();
    let mut out = Vec::with_capacity(len + 14);
    out.push(0x80 | opcode.as_u8());

    let mask_bit = if mask.is_some() { 0x80 } else { 0 };
    if len < 126 {
        out.push(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            let start = out.len();
            out.extend_from_slice(payload);
            apply_mask(&mut out[start..], key);
        }
        None => out.extend_from_slice(payload),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_encodings() {
        let short = encode_frame(OpCode::Text, &[0u8; 125], None);
        assert_eq!(&short[..2], &[0x81, 125]);
        assert_eq!(short.len(), 2 + 125);

        let medium = encode_frame(OpCode::Binary, &[0u8; 126], None);
        assert_eq!(&medium[..4], &[0x82, 126, 0x00, 126]);

        let edge = encode_frame(OpCode::Binary, &vec![0u8; 65535], None);
        assert_eq!(&edge[..4], &[0x82, 126, 0xFF, 0xFF]);

        let long = encode_frame(OpCode::Binary, &vec![0u8; 65536], None);
        assert_eq!(&long[..10], &[0x82, 127, 0, 0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn masked_client_frame() {
        let frame = encode_frame(OpCode::Text, b"Hello", Some([0x37, 0xfa, 0x21, 0x3d]));
        // Example frame from RFC 6455 section 5.7.
        assert_eq!(
            frame,
            [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn opcode_classes() {
        assert!(OpCode::Ping.is_control());
        assert!(!OpCode::Continuation.is_control());
        assert!(matches!(OpCode::from_u8(0x3), Err(WebSocketError::ReservedOpcode(3))));
        assert!(matches!(OpCode::from_u8(0xB), Err(WebSocketError::ReservedOpcode(0xB))));
        assert_eq!(OpCode::from_u8(0xA).unwrap(), OpCode::Pong);
    }
}
