//! Poll-driven server facade.
//!
//! A [`Server`] owns a listening socket and the registry of upgraded
//! connections. It never spawns tasks or runs a loop of its own: the driver
//! calls [`accept`](Server::accept), [`read_from`](Server::read_from) and
//! [`send_to`](Server::send_to) at whatever pace it likes.
//!
//! ```rust,no_run
//! use wspoll::Server;
//!
//! # async fn run() -> wspoll::Result<()> {
//! let mut server = Server::open(8080).await?;
//! loop {
//!     server.accept().await?;
//!     for address in server.clients() {
//!         if let Some(messages) = server.read_from(&address).await {
//!             for message in messages {
//!                 server.send_to(&address, message.payload()).await;
//!             }
//!         }
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//! }
//! # }
//! ```

mod upgrade;

pub use upgrade::upgrade;

use std::future::poll_fn;
use std::net::SocketAddr;
use std::task::Poll;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use crate::codec::WsSocket;
use crate::config::Config;
use crate::connection::{DisconnectObserver, PeerInfo, PollOutcome, Registry};
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::OpCode;

/// A WebSocket server driven by explicit calls.
pub struct Server {
    listener: TcpListener,
    registry: Registry<TcpStream>,
}

impl Server {
    /// Listen on all interfaces at `port` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Bind` if the port cannot be bound.
    pub async fn open(port: u16) -> Result<Self> {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port)), Config::default()).await
    }

    /// Listen on `addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Bind` if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs, config: Config) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(error = %e, "failed to bind listener");
            Error::Bind(e.to_string())
        })?;
        if let Ok(local) = listener.local_addr() {
            info!(address = %local, "listening");
        }
        Ok(Self {
            listener,
            registry: Registry::new(config),
        })
    }

    /// Install an observer told about every disconnect.
    #[must_use]
    pub fn with_observer(mut self, observer: impl DisconnectObserver + 'static) -> Self {
        self.registry.set_observer(observer);
        self
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the OS cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.registry.config()
    }

    /// Addresses of all registered clients.
    #[must_use]
    pub fn clients(&self) -> Vec<SocketAddr> {
        self.registry.addresses()
    }

    /// Handshake details of a registered client.
    #[must_use]
    pub fn peer(&self, address: &SocketAddr) -> Option<&PeerInfo> {
        self.registry.peer(address)
    }

    /// Accept and upgrade every connection already waiting on the listener.
    ///
    /// Never waits for a new connection. Connections whose handshake fails
    /// are logged, closed and left out of the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryConflict` if an upgraded connection's address
    /// is already registered. Connections accepted earlier in the same call
    /// stay registered.
    pub async fn accept(&mut self) -> Result<Vec<PeerInfo>> {
        let mut accepted = Vec::new();

        while let Some((stream, address)) = self.next_pending().await {
            debug!(%address, "incoming connection");
            let socket = WsSocket::new(stream, self.registry.config().retry.clone());
            let connection = match upgrade(socket, address, self.registry.config()).await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(%address, error = %e, "handshake failed");
                    continue;
                }
            };

            let info = connection.info().clone();
            self.registry.register(connection)?;
            info!(%address, path = %info.path, "client connected");
            accepted.push(info);
        }

        Ok(accepted)
    }

    async fn next_pending(&self) -> Option<(TcpStream, SocketAddr)> {
        poll_fn(|cx| match self.listener.poll_accept(cx) {
            Poll::Ready(Ok(pending)) => Poll::Ready(Some(pending)),
            Poll::Ready(Err(e)) => {
                warn!(error = %e, "accept failed");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Ready(None),
        })
        .await
    }

    /// Read everything a client has sent since the last call.
    ///
    /// Returns `None` if the client is unknown, timed out mid-frame, or was
    /// disconnected without completing any message during this call. A
    /// client that closes right after a message still has that message
    /// delivered.
    pub async fn read_from(&mut self, address: &SocketAddr) -> Option<Vec<Message>> {
        match self.registry.poll(address).await {
            PollOutcome::Messages(messages) => Some(messages),
            PollOutcome::Disconnected { messages, .. } if !messages.is_empty() => Some(messages),
            PollOutcome::Disconnected { .. } | PollOutcome::ReadTimeout | PollOutcome::Unknown => None,
        }
    }

    /// Like [`read_from`](Self::read_from), with the full outcome.
    pub async fn poll(&mut self, address: &SocketAddr) -> PollOutcome {
        self.registry.poll(address).await
    }

    /// Send a text frame. Returns whether it was written.
    pub async fn send_to(&mut self, address: &SocketAddr, payload: impl AsRef<[u8]>) -> bool {
        self.send(address, OpCode::Text, payload.as_ref()).await
    }

    /// Send a binary frame. Returns whether it was written.
    pub async fn send_binary_to(&mut self, address: &SocketAddr, payload: impl AsRef<[u8]>) -> bool {
        self.send(address, OpCode::Binary, payload.as_ref()).await
    }

    async fn send(&mut self, address: &SocketAddr, opcode: OpCode, payload: &[u8]) -> bool {
        match self.registry.send(address, opcode, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%address, error = %e, "send failed");
                false
            }
        }
    }

    /// Close a client with `code`. Returns `false` if it was not registered.
    pub async fn disconnect(&mut self, address: &SocketAddr, code: CloseCode) -> bool {
        self.registry.disconnect(address, code).await
    }

    /// Disconnect every client with 1000 and stop listening.
    pub async fn shutdown(mut self) {
        self.registry.shutdown().await;
        info!("server shut down");
    }
}
