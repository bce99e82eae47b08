use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

use crate::codec::WsSocket;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::frame::FrameHeader;
use crate::protocol::opcode::is_control_bits;
use crate::protocol::{Assembly, Frame, MessageAssembler, apply_mask_fast};

/// Why a [`FrameDecoder::drain`] call stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainEnd {
    /// No more bytes were immediately available.
    #[default]
    Idle,
    /// The peer sent a close frame.
    CloseReceived,
    /// The peer closed the stream.
    Eof,
    /// The peer broke the protocol; the connection must be closed with
    /// the given code.
    Violation(CloseCode),
}

/// Everything one drain produced.
#[derive(Debug, Default)]
pub struct Drain {
    /// Completed messages, in arrival order.
    pub messages: Vec<Message>,
    /// Frames read, of any kind.
    pub frames: usize,
    /// Pong frames seen.
    pub pongs: usize,
    /// Why the drain stopped.
    pub end: DrainEnd,
}

/// A frame as read off the wire, payload already unmasked.
struct RawFrame {
    header: FrameHeader,
    payload: Vec<u8>,
}

/// Reads frames off a socket until it runs dry and turns them into messages.
///
/// Pings are answered immediately. Fragment state lives in the decoder, so a
/// message split across several drains is still delivered whole.
#[derive(Debug)]
pub struct FrameDecoder {
    assembler: MessageAssembler,
    limits: Limits,
}

impl FrameDecoder {
    /// Decoder with no fragment sequence in progress.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            assembler: MessageAssembler::new(limits.clone()),
            limits,
        }
    }

    /// Whether a fragmented message is waiting for more frames.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.assembler.is_assembling()
    }

    /// Read every frame that is available right now.
    ///
    /// Only the first byte of each frame is read without waiting; once a
    /// frame has started, the rest of it is awaited within the socket's
    /// retry budget.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameReadTimeout` if a frame starts but does not
    /// finish in time. Messages completed earlier in the same call are
    /// dropped along with the partial sequence. Other I/O failures are
    /// returned as-is.
    pub async fn drain<T>(&mut self, socket: &mut WsSocket<T>) -> Result<Drain>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut drain = Drain::default();

        loop {
            let frame = match read_frame(socket, &self.limits).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(Error::ConnectionClosed) => {
                    drain.end = DrainEnd::Eof;
                    break;
                }
                Err(Error::FrameTooLarge { size, max }) => {
                    warn!(size, max, "frame exceeds size limit");
                    drain.end = DrainEnd::Violation(CloseCode::MessageTooBig);
                    break;
                }
                Err(e) => {
                    self.assembler.reset();
                    return Err(e);
                }
            };
            drain.frames += 1;

            let RawFrame { header, payload } = frame;
            trace!(
                opcode = header.opcode,
                fin = header.fin,
                len = payload.len(),
                "frame"
            );

            match header.opcode {
                0x8 => {
                    drain.end = DrainEnd::CloseReceived;
                    break;
                }
                0x9 => {
                    if let Err(e) = write_frame(socket, &Frame::pong(payload)).await {
                        warn!(error = %e, "failed to answer ping");
                    }
                }
                0xA => drain.pongs += 1,
                op if is_control_bits(op) => {
                    debug!(opcode = op, "ignoring reserved control frame");
                }
                op => match self.assembler.push(op, header.fin, &payload) {
                    Ok(Assembly::Complete(message)) => drain.messages.push(message),
                    Ok(Assembly::Pending) => {}
                    Ok(Assembly::Discarded(op)) => {
                        debug!(opcode = op, "dropped message with reserved opcode");
                    }
                    Err(Error::ProtocolViolation(reason)) => {
                        warn!(%reason, "protocol violation");
                        drain.end = DrainEnd::Violation(CloseCode::ProtocolError);
                        break;
                    }
                    Err(Error::MessageTooLarge { size, max }) => {
                        warn!(size, max, "message exceeds size limit");
                        drain.end = DrainEnd::Violation(CloseCode::MessageTooBig);
                        break;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(drain)
    }
}

async fn read_frame<T>(socket: &mut WsSocket<T>, limits: &Limits) -> Result<Option<RawFrame>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let Some(first) = socket.read_available(1).await? else {
        return Ok(None);
    };

    let second = socket.read_exact(1).await.map_err(frame_timeout)?;
    let header = FrameHeader::from_bytes(first[0], second[0]);

    let extended = socket
        .read_exact(header.extended_len_size())
        .await
        .map_err(frame_timeout)?;
    let len = header.payload_len(&extended);
    limits.check_frame_size(len)?;

    let mask = if header.masked {
        let key = socket.read_exact(4).await.map_err(frame_timeout)?;
        Some([key[0], key[1], key[2], key[3]])
    } else {
        None
    };

    // `check_frame_size` bounds `len` by a usize limit.
    let mut payload = socket
        .read_exact(len as usize)
        .await
        .map_err(frame_timeout)?
        .to_vec();
    if let Some(key) = mask {
        apply_mask_fast(&mut payload, key);
    }

    Ok(Some(RawFrame { header, payload }))
}

fn frame_timeout(err: Error) -> Error {
    match err {
        Error::ReadTimeout { .. } => Error::FrameReadTimeout,
        other => other,
    }
}

/// Serialize `frame` unmasked and write it out.
///
/// # Errors
///
/// Returns `Error::WriteError` if the socket does not take the bytes.
pub async fn write_frame<T>(socket: &mut WsSocket<T>, frame: &Frame) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    socket.write_all(&frame.to_bytes()).await
}
