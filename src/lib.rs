//! # wspoll - Poll-driven RFC 6455 WebSocket server engine
//!
//! `wspoll` accepts TCP connections, upgrades them with the WebSocket
//! opening handshake and exchanges frames with every connected client, all
//! driven by explicit calls from the host program. There is no background
//! task and no callback registry: the driver decides when to accept, when to
//! read from a client and what to send back.
//!
//! ## Features
//!
//! - **Bounded I/O**: every wait is capped by a configurable retry budget
//! - **Fragment reassembly** that survives across reads
//! - **Keepalive**: idle clients are pinged, then dropped
//! - **Runtime-agnostic core**: framing, masking and handshake parsing do not
//!   depend on tokio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wspoll::{Config, Server};
//!
//! # async fn run() -> wspoll::Result<()> {
//! let mut server = Server::bind("127.0.0.1:9000", Config::default()).await?;
//! for peer in server.accept().await? {
//!     server.send_to(&peer.address, "welcome").await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod codec;
#[cfg(feature = "async-tokio")]
pub mod server;

pub use config::{Config, KeepAlive, Limits, RetryPolicy};
pub use connection::{ConnectionState, DisconnectObserver, NoopObserver};
#[cfg(feature = "async-tokio")]
pub use connection::{Connection, PeerInfo, PollOutcome, Registry};
pub use error::{Error, Result};
pub use message::{CloseCode, Message};
pub use protocol::{HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};

#[cfg(feature = "async-tokio")]
pub use codec::WsSocket;
#[cfg(feature = "async-tokio")]
pub use server::Server;
