//! Lifecycle of a registered connection.

/// Where a connection is in its lifecycle.
///
/// A connection is created `Connecting` while its Upgrade request is being
/// processed and only enters the registry once `Open`. Disconnecting moves it
/// through `Closing` (close frame being sent) to `Closed`, after which it is
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Handshake in progress.
    #[default]
    Connecting,
    /// Registered; frames flow both ways.
    Open,
    /// Close frame is being sent.
    Closing,
    /// Socket closed.
    Closed,
}

impl ConnectionState {
    /// Whether the socket still needs closing.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Whether data frames may be read from or written to the peer.
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
