use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::codec::DrainEnd;
use crate::config::Config;
use crate::connection::observer::{DisconnectObserver, NoopObserver};
use crate::connection::{Connection, Liveness, PeerInfo};
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::OpCode;

/// Result of polling one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The connection is still open. May be empty.
    Messages(Vec<Message>),
    /// The connection was closed during the poll. `messages` holds whatever
    /// completed before the close.
    Disconnected {
        code: CloseCode,
        messages: Vec<Message>,
    },
    /// A frame started but did not finish in time. The connection stays
    /// registered unless configured otherwise.
    ReadTimeout,
    /// No connection is registered under that address.
    Unknown,
}

/// All open connections, keyed by remote address.
///
/// Every connection in the registry is `Open`. Removing one always closes
/// its socket and notifies the observer exactly once.
pub struct Registry<T> {
    connections: HashMap<SocketAddr, Connection<T>>,
    config: Config,
    observer: Box<dyn DisconnectObserver>,
}

impl<T> Registry<T> {
    /// Empty registry with a no-op observer.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            connections: HashMap::new(),
            config,
            observer: Box::new(NoopObserver),
        }
    }

    /// Replace the disconnect observer.
    pub fn set_observer(&mut self, observer: impl DisconnectObserver + 'static) {
        self.observer = Box::new(observer);
    }

    /// Configuration shared by every connection.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add an upgraded connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryConflict` if the address is already taken.
    /// The existing connection is left untouched.
    pub fn register(&mut self, connection: Connection<T>) -> Result<()> {
        let address = connection.address();
        match self.connections.entry(address) {
            Entry::Occupied(_) => {
                error!(%address, "connection already registered");
                Err(Error::RegistryConflict(address))
            }
            Entry::Vacant(slot) => {
                slot.insert(connection);
                debug!(%address, total = self.connections.len(), "registered");
                Ok(())
            }
        }
    }

    /// Whether `address` is registered.
    #[must_use]
    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.connections.contains_key(address)
    }

    /// Addresses of all open connections, in no particular order.
    #[must_use]
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.connections.keys().copied().collect()
    }

    /// Handshake details of a registered peer.
    #[must_use]
    pub fn peer(&self, address: &SocketAddr) -> Option<&PeerInfo> {
        self.connections.get(address).map(Connection::info)
    }

    /// Number of open connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Registry<T> {
    /// Run keepalive for one connection and drain its pending frames.
    ///
    /// A connection quiet past the idle timeout is dropped with 1001; one
    /// quiet past the ping interval is pinged first, on every poll. Then
    /// every available frame is read. A close frame drops the connection with 1000, end of
    /// stream with 1001, broken framing with 1002 and oversized data with
    /// 1009.
    pub async fn poll(&mut self, address: &SocketAddr) -> PollOutcome {
        let Some(connection) = self.connections.get_mut(address) else {
            return PollOutcome::Unknown;
        };

        match connection.liveness(Instant::now(), &self.config.keepalive) {
            Liveness::Expired => {
                info!(%address, "idle timeout");
                self.disconnect(address, CloseCode::GoingAway).await;
                return PollOutcome::Disconnected {
                    code: CloseCode::GoingAway,
                    messages: Vec::new(),
                };
            }
            Liveness::NeedsPing => {
                debug!(%address, "sending keepalive ping");
                if let Err(e) = connection.ping(&self.config.keepalive.ping_payload).await {
                    warn!(%address, error = %e, "keepalive ping failed");
                }
            }
            Liveness::Fresh => {}
        }

        let (code, messages) = match connection.read().await {
            Ok(drain) => match drain.end {
                DrainEnd::Idle => {
                    if drain.pongs > 0 {
                        debug!(%address, pongs = drain.pongs, "keepalive confirmed");
                    }
                    return PollOutcome::Messages(drain.messages);
                }
                DrainEnd::CloseReceived => (CloseCode::Normal, drain.messages),
                DrainEnd::Eof => (CloseCode::GoingAway, drain.messages),
                DrainEnd::Violation(code) => (code, drain.messages),
            },
            Err(Error::FrameReadTimeout) => {
                warn!(%address, "timed out reading frame");
                if !self.config.disconnect_on_read_timeout {
                    return PollOutcome::ReadTimeout;
                }
                (CloseCode::ProtocolError, Vec::new())
            }
            Err(e) => {
                warn!(%address, error = %e, "read failed");
                (CloseCode::GoingAway, Vec::new())
            }
        };

        self.disconnect(address, code).await;
        PollOutcome::Disconnected { code, messages }
    }

    /// Send one data frame to a registered peer.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownPeer` if nothing is registered under `address`
    /// - `Error::WriteError` if the frame could not be written; the
    ///   connection stays registered
    pub async fn send(&mut self, address: &SocketAddr, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let connection = self
            .connections
            .get_mut(address)
            .ok_or(Error::UnknownPeer(*address))?;
        connection.send(opcode, payload).await
    }

    /// Close a connection with `code` and remove it.
    ///
    /// Returns `false` if nothing was registered under `address`.
    pub async fn disconnect(&mut self, address: &SocketAddr, code: CloseCode) -> bool {
        let Some(mut connection) = self.connections.remove(address) else {
            debug!(%address, "disconnect of unknown peer");
            return false;
        };

        info!(%address, %code, "disconnecting");
        connection.close(code).await;
        self.observer.on_disconnect(*address, code);
        true
    }

    /// Disconnect every connection with 1000.
    pub async fn shutdown(&mut self) {
        let addresses = self.addresses();
        info!(count = addresses.len(), "closing all connections");
        for address in addresses {
            self.disconnect(&address, CloseCode::Normal).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WsSocket;
    use crate::config::KeepAlive;
    use crate::protocol::Frame;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    type Log = Arc<Mutex<Vec<(SocketAddr, CloseCode)>>>;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn peer(registry: &Registry<DuplexStream>, port: u16) -> (DuplexStream, Connection<DuplexStream>) {
        let (client, server) = duplex(1 << 16);
        let info = PeerInfo {
            address: addr(port),
            path: String::new(),
            cookie: None,
            subprotocol: None,
        };
        let socket = WsSocket::new(server, registry.config().retry.clone());
        (client, Connection::new(socket, info, registry.config()))
    }

    fn observed(config: Config) -> (Registry<DuplexStream>, Log) {
        let log: Log = Arc::default();
        let mut registry = Registry::new(config);
        let sink = Arc::clone(&log);
        registry.set_observer(move |address: SocketAddr, code: CloseCode| {
            sink.lock().unwrap().push((address, code));
        });
        (registry, log)
    }

    fn masked(frame: &Frame) -> Vec<u8> {
        let mut buf = vec![0u8; frame.wire_size(true)];
        frame.write(&mut buf, Some([9, 8, 7, 6])).unwrap();
        buf
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut registry = Registry::new(Config::default());
        let (_client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        assert!(registry.contains(&addr(1000)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.addresses(), vec![addr(1000)]);
        assert!(registry.peer(&addr(1000)).is_some());
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let mut registry = Registry::new(Config::default());
        let (_a, first) = peer(&registry, 1000);
        let (_b, second) = peer(&registry, 1000);

        registry.register(first).unwrap();
        assert_eq!(
            registry.register(second),
            Err(Error::RegistryConflict(addr(1000)))
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_poll_unknown() {
        let mut registry: Registry<DuplexStream> = Registry::new(Config::default());
        assert_eq!(registry.poll(&addr(1)).await, PollOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_poll_returns_messages() {
        let mut registry = Registry::new(Config::default());
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Messages(Vec::new())
        );

        client.write_all(&masked(&Frame::text("hi"))).await.unwrap();
        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Messages(vec![Message::text("hi")])
        );
    }

    #[tokio::test]
    async fn test_close_frame_disconnects_with_normal() {
        let (mut registry, log) = observed(Config::default());
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        let mut bytes = masked(&Frame::text("last"));
        bytes.extend(masked(&Frame::close(CloseCode::Normal)));
        client.write_all(&bytes).await.unwrap();

        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Disconnected {
                code: CloseCode::Normal,
                messages: vec![Message::text("last")],
            }
        );
        assert!(registry.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![(addr(1000), CloseCode::Normal)]);

        let mut echoed = Vec::new();
        client.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, vec![0x88, 0x02, 0x03, 0xe8]);
    }

    #[tokio::test]
    async fn test_eof_disconnects_with_going_away() {
        let (mut registry, log) = observed(Config::default());
        let (client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();
        drop(client);

        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Disconnected {
                code: CloseCode::GoingAway,
                messages: Vec::new(),
            }
        );
        assert_eq!(*log.lock().unwrap(), vec![(addr(1000), CloseCode::GoingAway)]);
    }

    #[tokio::test]
    async fn test_violation_disconnects_with_protocol_error() {
        let mut registry = Registry::new(Config::default());
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        client
            .write_all(&masked(&Frame::new(true, OpCode::Continuation, vec![1])))
            .await
            .unwrap();
        assert!(matches!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Disconnected {
                code: CloseCode::ProtocolError,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_peer_is_pinged_then_dropped() {
        let keepalive = KeepAlive::new(Duration::from_secs(60), Duration::from_secs(10));
        let (mut registry, log) = observed(Config::default().with_keepalive(keepalive));
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Messages(Vec::new())
        );
        let mut ping = [0u8; 5];
        client.read_exact(&mut ping).await.unwrap();
        assert_eq!(ping, [0x89, 0x03, b'h', b'e', b'y']);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Disconnected {
                code: CloseCode::GoingAway,
                messages: Vec::new(),
            }
        );
        assert!(!registry.contains(&addr(1000)));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_peer_is_pinged_on_every_poll() {
        let keepalive = KeepAlive::new(Duration::from_secs(60), Duration::from_secs(10));
        let mut registry = Registry::new(Config::default().with_keepalive(keepalive));
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        registry.poll(&addr(1000)).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Messages(Vec::new())
        );

        let mut pings = [0u8; 10];
        client.read_exact(&mut pings).await.unwrap();
        assert_eq!(
            pings,
            [0x89, 0x03, b'h', b'e', b'y', 0x89, 0x03, b'h', b'e', b'y']
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_keeps_connection_alive() {
        let keepalive = KeepAlive::new(Duration::from_secs(60), Duration::from_secs(10));
        let mut registry = Registry::new(Config::default().with_keepalive(keepalive));
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        tokio::time::advance(Duration::from_secs(65)).await;
        client.write_all(&masked(&Frame::pong(b"hey".to_vec()))).await.unwrap();
        registry.poll(&addr(1000)).await;

        tokio::time::advance(Duration::from_secs(65)).await;
        assert!(matches!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Messages(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_keeps_connection_by_default() {
        let config = Config::default().with_read_retry(3, Duration::from_millis(10));
        let mut registry = Registry::new(config);
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        client.write_all(&[0x81, 0x85, 1]).await.unwrap();
        assert_eq!(registry.poll(&addr(1000)).await, PollOutcome::ReadTimeout);
        assert!(registry.contains(&addr(1000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_can_disconnect() {
        let config = Config::default()
            .with_read_retry(3, Duration::from_millis(10))
            .with_disconnect_on_read_timeout(true);
        let mut registry = Registry::new(config);
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        client.write_all(&[0x81, 0x85, 1]).await.unwrap();
        assert!(matches!(
            registry.poll(&addr(1000)).await,
            PollOutcome::Disconnected {
                code: CloseCode::ProtocolError,
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_registered_and_unknown() {
        let mut registry = Registry::new(Config::default());
        let (mut client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        registry.send(&addr(1000), OpCode::Text, b"yo").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x81, 0x02, b'y', b'o']);

        assert_eq!(
            registry.send(&addr(2000), OpCode::Text, b"yo").await,
            Err(Error::UnknownPeer(addr(2000)))
        );
    }

    #[tokio::test]
    async fn test_disconnect_twice() {
        let (mut registry, log) = observed(Config::default());
        let (_client, conn) = peer(&registry, 1000);
        registry.register(conn).unwrap();

        assert!(registry.disconnect(&addr(1000), CloseCode::Normal).await);
        assert!(!registry.disconnect(&addr(1000), CloseCode::Normal).await);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everyone() {
        let (mut registry, log) = observed(Config::default());
        let mut clients = Vec::new();
        for port in 1000..1003 {
            let (client, conn) = peer(&registry, port);
            registry.register(conn).unwrap();
            clients.push(client);
        }

        registry.shutdown().await;
        assert!(registry.is_empty());

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|(_, code)| *code == CloseCode::Normal));
    }
}
