use std::net::SocketAddr;

use crate::message::CloseCode;

/// Told about every connection the registry drops.
///
/// Called once per disconnect, after the socket is closed and the
/// connection removed. Closures with the same signature implement it.
pub trait DisconnectObserver: Send {
    fn on_disconnect(&mut self, address: SocketAddr, code: CloseCode);
}

impl<F> DisconnectObserver for F
where
    F: FnMut(SocketAddr, CloseCode) + Send,
{
    fn on_disconnect(&mut self, address: SocketAddr, code: CloseCode) {
        self(address, code);
    }
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DisconnectObserver for NoopObserver {
    fn on_disconnect(&mut self, _address: SocketAddr, _code: CloseCode) {}
}
