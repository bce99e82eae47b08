//! WebSocket frame layout, parsing and serialization (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK is set)                  |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```

use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::opcode::OPCODE_MASK;

/// Largest payload length that fits in the 7-bit length field.
pub const MAX_INLINE_LEN: usize = 125;

/// Length marker announcing a 16-bit extended length.
pub const LEN_MARKER_16: u8 = 126;

/// Length marker announcing a 64-bit extended length.
pub const LEN_MARKER_64: u8 = 127;

/// The two fixed header bytes of a frame, decoded.
///
/// The opcode is kept raw so that reserved values can still be consumed
/// and discarded by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Raw 4-bit opcode.
    pub opcode: u8,
    /// Whether a 4-byte masking key follows the length.
    pub masked: bool,
    /// The 7-bit length field (0-125, or one of the two markers).
    pub len_field: u8,
}

impl FrameHeader {
    /// Decode the first two header bytes.
    #[must_use]
    pub const fn from_bytes(byte0: u8, byte1: u8) -> Self {
        Self {
            fin: byte0 & 0x80 != 0,
            opcode: byte0 & OPCODE_MASK,
            masked: byte1 & 0x80 != 0,
            len_field: byte1 & 0x7F,
        }
    }

    /// Number of extended length bytes that follow (0, 2 or 8).
    #[must_use]
    pub const fn extended_len_size(&self) -> usize {
        match self.len_field {
            LEN_MARKER_16 => 2,
            LEN_MARKER_64 => 8,
            _ => 0,
        }
    }

    /// Resolve the payload length from the extended length bytes.
    ///
    /// `extended` must hold exactly [`extended_len_size`](Self::extended_len_size)
    /// big-endian bytes.
    #[must_use]
    pub fn payload_len(&self, extended: &[u8]) -> u64 {
        if self.extended_len_size() == 0 {
            return u64::from(self.len_field);
        }
        extended
            .iter()
            .fold(0u64, |len, &byte| (len << 8) | u64::from(byte))
    }
}

/// Pick the smallest length encoding for a payload.
///
/// Returns the 7-bit length field and the number of extended length bytes.
#[must_use]
pub const fn length_encoding(payload_len: usize) -> (u8, usize) {
    if payload_len <= MAX_INLINE_LEN {
        (payload_len as u8, 0)
    } else if payload_len <= u16::MAX as usize {
        (LEN_MARKER_16, 2)
    } else {
        (LEN_MARKER_64, 8)
    }
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame carrying `code` as a 2-byte big-endian payload.
    #[must_use]
    pub fn close(code: CloseCode) -> Self {
        Self::new(true, OpCode::Close, code.to_payload().to_vec())
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse one complete frame from the start of `buf`.
    ///
    /// Returns the frame (unmasked) and the number of bytes consumed.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` ends before the frame does
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    /// - `Error::FrameTooLarge` if the length does not fit in memory
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let header = FrameHeader::from_bytes(buf[0], buf[1]);
        let opcode = OpCode::from_u8(header.opcode)?;

        let len_end = 2 + header.extended_len_size();
        if buf.len() < len_end {
            return Err(Error::IncompleteFrame {
                needed: len_end - buf.len(),
            });
        }
        let declared = header.payload_len(&buf[2..len_end]);
        let payload_len = usize::try_from(declared).map_err(|_| Error::FrameTooLarge {
            size: declared,
            max: usize::MAX,
        })?;

        let payload_start = if header.masked { len_end + 4 } else { len_end };
        let total = payload_start
            .checked_add(payload_len)
            .ok_or(Error::FrameTooLarge {
                size: declared,
                max: usize::MAX - payload_start,
            })?;
        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = buf[payload_start..total].to_vec();
        if header.masked {
            let key = [buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]];
            apply_mask_fast(&mut payload, key);
        }

        Ok((Self::new(header.fin, opcode, payload), total))
    }

    /// Write the frame into `buf`, masking the payload when `mask` is given.
    ///
    /// The server never masks; masking is only needed to produce
    /// client-side frames. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFrame` if the buffer is too small.
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let payload_len = self.payload.len();
        let total_size = self.wire_size(mask.is_some());
        if buf.len() < total_size {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total_size,
                buf.len()
            )));
        }

        let (len_field, extended_len_size) = length_encoding(payload_len);

        buf[0] = (if self.fin { 0x80 } else { 0x00 }) | self.opcode.as_u8();
        buf[1] = (if mask.is_some() { 0x80 } else { 0x00 }) | len_field;

        let mut offset = 2;
        match extended_len_size {
            2 => buf[offset..offset + 2].copy_from_slice(&(payload_len as u16).to_be_bytes()),
            8 => buf[offset..offset + 8].copy_from_slice(&(payload_len as u64).to_be_bytes()),
            _ => {}
        }
        offset += extended_len_size;

        if let Some(key) = mask {
            buf[offset..offset + 4].copy_from_slice(&key);
            offset += 4;
        }

        let payload_out = &mut buf[offset..offset + payload_len];
        payload_out.copy_from_slice(&self.payload);
        if let Some(key) = mask {
            apply_mask_fast(payload_out, key);
        }

        Ok(total_size)
    }

    /// Serialize as an unmasked server-to-client frame.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_size(false)];
        // The buffer is sized by wire_size, so the write cannot run short.
        let written = self.write(&mut buf, None).unwrap_or(0);
        buf.truncate(written);
        buf
    }

    /// Calculate the number of bytes this frame occupies on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let (_, extended_len_size) = length_encoding(self.payload.len());
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + self.payload.len()
    }
}
