//! Reassembly of fragmented data frames into messages.

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::OpCode;

/// Per-connection reassembly state.
#[derive(Debug, Default)]
enum Sequence {
    /// No fragment sequence in progress.
    #[default]
    Idle,
    /// A text or binary sequence is being collected.
    Assembling { opcode: OpCode, buffer: BytesMut },
    /// A sequence started by a reserved opcode; its fragments are dropped.
    Discarding { opcode: u8 },
}

/// What a pushed frame produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Assembly {
    /// The sequence continues; more fragments are expected.
    Pending,
    /// A complete text or binary message.
    Complete(Message),
    /// A complete sequence with a reserved opcode was dropped.
    Discarded(u8),
}

/// Reassembles data frames (raw opcodes 0x0-0x7) into messages.
///
/// Control frames never go through the assembler, so a ping or pong in the
/// middle of a fragmented message leaves the sequence untouched. The state
/// survives between reads: a sequence cut short by an empty socket resumes
/// with the next fragment.
#[derive(Debug)]
pub struct MessageAssembler {
    sequence: Sequence,
    limits: Limits,
}

impl MessageAssembler {
    /// Idle assembler enforcing `limits.max_message_size`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            sequence: Sequence::Idle,
            limits,
        }
    }

    /// Add one data frame.
    ///
    /// Once a sequence is active, every following data frame is appended to
    /// it regardless of its own opcode; the sequence keeps the opcode of the
    /// frame that started it.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` if a continuation frame (0x0) arrives
    ///   with no sequence in progress
    /// - `Error::MessageTooLarge` if the reassembled payload exceeds the limit
    pub fn push(&mut self, opcode: u8, fin: bool, payload: &[u8]) -> Result<Assembly> {
        match &mut self.sequence {
            Sequence::Idle => match OpCode::from_u8(opcode) {
                Ok(OpCode::Continuation) => Err(Error::ProtocolViolation(
                    "Continuation frame without a message in progress".into(),
                )),
                Ok(op) if op.is_message() => {
                    self.limits.check_message_size(payload.len())?;
                    self.sequence = Sequence::Assembling {
                        opcode: op,
                        buffer: BytesMut::from(payload),
                    };
                    Ok(self.finish_if(fin))
                }
                _ => {
                    self.sequence = Sequence::Discarding { opcode };
                    Ok(self.finish_if(fin))
                }
            },
            Sequence::Assembling { buffer, .. } => {
                let size = buffer.len() + payload.len();
                if let Err(e) = self.limits.check_message_size(size) {
                    self.reset();
                    return Err(e);
                }
                buffer.extend_from_slice(payload);
                Ok(self.finish_if(fin))
            }
            Sequence::Discarding { .. } => Ok(self.finish_if(fin)),
        }
    }

    fn finish_if(&mut self, fin: bool) -> Assembly {
        if !fin {
            return Assembly::Pending;
        }
        match std::mem::take(&mut self.sequence) {
            Sequence::Assembling { opcode, buffer } => {
                Assembly::Complete(Message::new(opcode, buffer.to_vec()))
            }
            Sequence::Discarding { opcode } => Assembly::Discarded(opcode),
            Sequence::Idle => Assembly::Pending,
        }
    }

    /// Whether a fragment sequence is in progress.
    pub fn is_assembling(&self) -> bool {
        !matches!(self.sequence, Sequence::Idle)
    }

    /// Drop any partially collected sequence.
    pub fn reset(&mut self) {
        self.sequence = Sequence::Idle;
    }
}
