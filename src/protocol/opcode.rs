//! Frame opcodes (RFC 6455 Section 5.2).

use crate::error::{Error, Result};

/// Mask selecting the opcode bits of the first header byte.
pub const OPCODE_MASK: u8 = 0x0F;

/// WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation frame (0x0), only valid inside a fragment sequence.
    Continuation = 0x0,
    /// Text frame (0x1).
    Text = 0x1,
    /// Binary frame (0x2).
    Binary = 0x2,
    /// Close frame (0x8).
    Close = 0x8,
    /// Ping frame (0x9). The server answers with a pong echoing the payload.
    Ping = 0x9,
    /// Pong frame (0xA). Refreshes the peer's keepalive.
    Pong = 0xA,
}

impl OpCode {
    /// Create an `OpCode` from the low four bits of a header byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for 0x3-0x7 and 0xB-0xF, and
    /// `Error::InvalidOpcode` for values that do not fit in four bits.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            0x3..=0x7 | 0xB..=0xF => Err(Error::ReservedOpcode(byte)),
            _ => Err(Error::InvalidOpcode(byte)),
        }
    }

    /// Convert to the raw 4-bit value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping and Pong.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        is_control_bits(self as u8)
    }

    /// Text and Binary: the only opcodes delivered to the driver as messages.
    #[inline]
    #[must_use]
    pub const fn is_message(self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }
}

/// Whether a raw opcode lies in the control range (0x8-0xF), reserved
/// values included.
#[inline]
#[must_use]
pub const fn is_control_bits(raw: u8) -> bool {
    raw & 0x08 != 0
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        f.write_str(name)
    }
}
