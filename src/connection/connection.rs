use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::debug;

use crate::codec::{Drain, FrameDecoder, WsSocket, write_frame};
use crate::config::{Config, KeepAlive};
use crate::connection::ConnectionState;
use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::{Frame, OpCode};

/// What the server learned about a peer during its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Remote address; the registry key.
    pub address: SocketAddr,
    /// Resource path from the request line, without the leading `/`.
    pub path: String,
    /// `Cookie` header, if sent.
    pub cookie: Option<String>,
    /// Subprotocol echoed back to the peer, if one was requested.
    pub subprotocol: Option<String>,
}

/// Keepalive verdict for a connection at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Recent traffic; nothing to do.
    Fresh,
    /// Quiet for longer than the ping interval.
    NeedsPing,
    /// Quiet for longer than the idle timeout.
    Expired,
}

/// One upgraded peer.
///
/// Owns the socket, the fragment state and the activity clock. Only the
/// registry creates and drives these; they are not shared.
pub struct Connection<T> {
    socket: WsSocket<T>,
    decoder: FrameDecoder,
    info: PeerInfo,
    state: ConnectionState,
    last_activity: Instant,
}

impl<T> Connection<T> {
    /// Wrap an upgraded socket. The connection starts `Open` with its
    /// activity clock set to now.
    pub fn new(socket: WsSocket<T>, info: PeerInfo, config: &Config) -> Self {
        Self {
            socket,
            decoder: FrameDecoder::new(config.limits.clone()),
            info,
            state: ConnectionState::Open,
            last_activity: Instant::now(),
        }
    }

    /// Handshake details of the peer.
    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    /// Remote address of the peer.
    pub fn address(&self) -> SocketAddr {
        self.info.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// When the peer last sent a frame.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Record traffic from the peer.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Classify the connection by how long it has been quiet.
    ///
    /// Past the ping interval every poll pings again until the peer answers
    /// or the idle timeout runs out.
    pub fn liveness(&self, now: Instant, keepalive: &KeepAlive) -> Liveness {
        let idle = now.saturating_duration_since(self.last_activity);
        if idle > keepalive.idle_timeout() {
            Liveness::Expired
        } else if idle > keepalive.ping_interval {
            Liveness::NeedsPing
        } else {
            Liveness::Fresh
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Send a keepalive ping.
    ///
    /// # Errors
    ///
    /// Returns `Error::WriteError` if the frame could not be written.
    pub async fn ping(&mut self, payload: &[u8]) -> Result<()> {
        write_frame(&mut self.socket, &Frame::ping(payload)).await
    }

    /// Drain every frame currently available from the peer.
    ///
    /// Reading at least one frame refreshes the activity clock.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is no longer open
    /// - `Error::FrameReadTimeout` if a frame started but did not finish
    pub async fn read(&mut self) -> Result<Drain> {
        if !self.state.is_open() {
            return Err(Error::ConnectionClosed);
        }
        let drain = self.decoder.drain(&mut self.socket).await?;
        if drain.frames > 0 {
            self.touch();
        }
        Ok(drain)
    }

    /// Send a single unfragmented data frame.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is no longer open
    /// - `Error::WriteError` if the frame could not be written
    pub async fn send(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if !self.state.is_open() {
            return Err(Error::ConnectionClosed);
        }
        write_frame(&mut self.socket, &Frame::new(true, opcode, payload.to_vec())).await
    }

    /// Send a close frame carrying `code` and close the socket.
    ///
    /// Best-effort: a peer that is already gone does not make this fail.
    pub async fn close(&mut self, code: CloseCode) {
        if !self.state.is_active() {
            return;
        }
        self.state = ConnectionState::Closing;
        if let Err(e) = write_frame(&mut self.socket, &Frame::close(code)).await {
            debug!(address = %self.info.address, error = %e, "close frame not delivered");
        }
        self.socket.close().await;
        self.state = ConnectionState::Closed;
    }
}
