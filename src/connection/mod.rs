//! Connection lifecycle and the registry of open connections.
//!
//! A connection is created by a successful handshake, registered under its
//! remote address, polled by the driver and eventually removed with a close
//! code:
//!
//! 1. **Connecting** - Upgrade request being processed
//! 2. **Open** - registered, frames flow
//! 3. **Closing** - close frame being sent
//! 4. **Closed** - socket shut down, connection dropped
//!
//! Everything here is single-owner: the registry is driven through
//! `&mut self` and needs no locking.

mod observer;
mod state;

pub use observer::{DisconnectObserver, NoopObserver};
pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;
#[cfg(feature = "async-tokio")]
mod registry;

#[cfg(feature = "async-tokio")]
pub use connection::{Connection, Liveness, PeerInfo};
#[cfg(feature = "async-tokio")]
pub use registry::{PollOutcome, Registry};
