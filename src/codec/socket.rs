//! Bounded byte I/O over a stream.
//!
//! `WsSocket` is the only thing in the crate that touches a peer's stream.
//! Reads never block the caller for longer than the retry budget of the
//! [`RetryPolicy`]; waits are readiness-based, so an idle peer costs no CPU.

use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::{Error, Result};

const READ_CHUNK: usize = 4096;

/// A stream with a read-ahead buffer and bounded read/write operations.
///
/// Bytes read past what a caller asked for stay buffered and are served to
/// the next read, so frames pipelined behind the Upgrade request are not
/// lost.
pub struct WsSocket<T> {
    io: T,
    read_buf: BytesMut,
    retry: RetryPolicy,
}

impl<T> WsSocket<T> {
    /// Wrap a stream with an empty read buffer.
    #[must_use]
    pub fn new(io: T, retry: RetryPolicy) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            retry,
        }
    }

    /// Budget applied to every bounded read and write.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of bytes already read from the stream but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    /// Borrow the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    /// Unwrap the stream. Buffered bytes are discarded.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> WsSocket<T> {
    /// Read exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// - `Error::ReadTimeout` if the bytes do not arrive within the retry budget
    /// - `Error::ConnectionClosed` if the peer closes the stream first
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        if self.read_buf.len() < n {
            let budget = self.retry.budget();
            match timeout(budget, self.fill_to(n)).await {
                Ok(filled) => filled?,
                Err(_) => {
                    return Err(Error::ReadTimeout {
                        wanted: n - self.read_buf.len(),
                    });
                }
            }
        }
        Ok(self.read_buf.split_to(n).freeze())
    }

    /// Return up to `max` bytes that can be had without waiting.
    ///
    /// Polls the stream once; `Ok(None)` means nothing is ready.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionClosed` at end of stream.
    pub async fn read_available(&mut self, max: usize) -> Result<Option<Bytes>> {
        if self.read_buf.is_empty() {
            let mut chunk = [0u8; READ_CHUNK];
            let io = &mut self.io;
            let polled = poll_fn(|cx| {
                let mut buf = ReadBuf::new(&mut chunk);
                match Pin::new(&mut *io).poll_read(cx, &mut buf) {
                    Poll::Ready(Ok(())) => Poll::Ready(Ok(Some(buf.filled().len()))),
                    Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                    Poll::Pending => Poll::Ready(Ok(None)),
                }
            })
            .await?;

            match polled {
                None => return Ok(None),
                Some(0) => return Err(Error::ConnectionClosed),
                Some(n) => self.read_buf.extend_from_slice(&chunk[..n]),
            }
        }

        let n = max.min(self.read_buf.len());
        Ok(Some(self.read_buf.split_to(n).freeze()))
    }

    /// Read one `\n`-terminated line, without the terminator and a
    /// preceding `\r`.
    ///
    /// Each wait lasts one retry interval; the read gives up after the
    /// configured number of consecutive waits without new bytes.
    ///
    /// # Errors
    ///
    /// - `Error::ReadTimeout` if the peer goes quiet for the whole budget
    /// - `Error::HandshakeTooLarge` if more than `max_len` bytes arrive
    ///   without a line break
    /// - `Error::ConnectionClosed` if the peer closes the stream first
    pub async fn read_line(&mut self, max_len: usize) -> Result<BytesMut> {
        let mut idle = 0u32;
        loop {
            if let Some(pos) = self.read_buf.iter().position(|&b| b == b'\n') {
                let mut line = self.read_buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Ok(line);
            }

            if self.read_buf.len() > max_len {
                return Err(Error::HandshakeTooLarge {
                    size: self.read_buf.len(),
                    max: max_len,
                });
            }

            if self.fill_once().await? {
                idle = 0;
            } else {
                idle += 1;
                if idle >= self.retry.attempts {
                    return Err(Error::ReadTimeout { wanted: 1 });
                }
            }
        }
    }

    /// Write the whole buffer and flush.
    ///
    /// # Errors
    ///
    /// Returns `Error::WriteError` if the stream fails, stalls for the whole
    /// retry budget, or keeps accepting zero bytes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let budget = self.retry.budget();
        let mut remaining = data;
        let mut zero_writes = 0u32;

        while !remaining.is_empty() {
            let written = match timeout(budget, self.io.write(remaining)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(Error::WriteError(e.to_string())),
                Err(_) => {
                    return Err(Error::WriteError(format!(
                        "no progress within {:?}",
                        budget
                    )));
                }
            };

            if written == 0 {
                zero_writes += 1;
                debug!(
                    remaining = remaining.len(),
                    total = data.len(),
                    "wrote 0 bytes"
                );
                if zero_writes > self.retry.max_zero_writes {
                    return Err(Error::WriteError(format!(
                        "{} zero-byte writes with {} of {} bytes left",
                        zero_writes,
                        remaining.len(),
                        data.len()
                    )));
                }
                sleep(self.retry.interval).await;
                continue;
            }

            remaining = &remaining[written..];
        }

        match timeout(budget, self.io.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::WriteError(e.to_string())),
            Err(_) => Err(Error::WriteError("flush timed out".into())),
        }
    }

    /// Shut down the write half. Errors are ignored; the peer may already
    /// be gone.
    pub async fn close(&mut self) {
        let _ = timeout(self.retry.interval, self.io.shutdown()).await;
    }

    async fn fill_to(&mut self, n: usize) -> Result<()> {
        while self.read_buf.len() < n {
            self.read_buf.reserve((n - self.read_buf.len()).max(READ_CHUNK));
            if self.io.read_buf(&mut self.read_buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
        Ok(())
    }

    /// Wait one retry interval for more bytes. Returns whether any arrived.
    async fn fill_once(&mut self) -> Result<bool> {
        self.read_buf.reserve(READ_CHUNK);
        match timeout(self.retry.interval, self.io.read_buf(&mut self.read_buf)).await {
            Ok(Ok(0)) => Err(Error::ConnectionClosed),
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }
}
