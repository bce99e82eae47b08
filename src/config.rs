//! Configuration, limits and timing policy for the server engine.

use std::time::Duration;

/// Size limits applied while reading from peers.
///
/// These limits keep a single peer from exhausting memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum declared payload size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a reassembled message in bytes.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum size of the Upgrade request head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_message_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_handshake_size,
        }
    }

    /// Validate a declared frame length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate the size of a message being reassembled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate the size of the handshake head received so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Bounded-wait policy for socket reads and writes.
///
/// A read waits at most `interval` per attempt and gives up after
/// `attempts` unsuccessful attempts, so the worst case for one read is
/// `attempts * interval` (10 seconds with the defaults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of wait attempts before a read times out.
    ///
    /// Default: 1000
    pub attempts: u32,

    /// Length of a single wait attempt.
    ///
    /// Default: 10 ms
    pub interval: Duration,

    /// Number of zero-byte writes tolerated before a send fails.
    ///
    /// Default: 16
    pub max_zero_writes: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1000,
            interval: Duration::from_millis(10),
            max_zero_writes: 16,
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with custom values.
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration, max_zero_writes: u32) -> Self {
        Self {
            attempts,
            interval,
            max_zero_writes,
        }
    }

    /// Worst-case time a single bounded read may wait.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.attempts)
    }
}

/// Keepalive policy for established connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAlive {
    /// Idle time after which the server pings the peer.
    ///
    /// Default: 60 seconds
    pub ping_interval: Duration,

    /// Extra idle time granted after `ping_interval` before the peer is
    /// disconnected with code 1001.
    ///
    /// Default: 10 seconds
    pub timeout_grace: Duration,

    /// Payload carried by keepalive pings.
    ///
    /// Default: `b"hey"`
    pub ping_payload: Vec<u8>,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(60),
            timeout_grace: Duration::from_secs(10),
            ping_payload: b"hey".to_vec(),
        }
    }
}

impl KeepAlive {
    /// Create a keepalive policy with the default ping payload.
    #[must_use]
    pub fn new(ping_interval: Duration, timeout_grace: Duration) -> Self {
        Self {
            ping_interval,
            timeout_grace,
            ..Default::default()
        }
    }

    /// Idle time after which a connection is considered dead.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.ping_interval.saturating_add(self.timeout_grace)
    }
}

/// Server engine configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Bounded-wait policy for socket I/O.
    pub retry: RetryPolicy,

    /// Ping and idle-timeout policy.
    pub keepalive: KeepAlive,

    /// Disconnect (code 1002) when a frame cannot be read within the retry
    /// budget instead of only dropping that poll's messages.
    ///
    /// Default: false
    pub disconnect_on_read_timeout: bool,
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the socket retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the number of read attempts and the wait per attempt.
    #[must_use]
    pub fn with_read_retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.retry.attempts = attempts;
        self.retry.interval = interval;
        self
    }

    /// Set the keepalive policy.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: KeepAlive) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set whether a frame read timeout tears the connection down.
    #[must_use]
    pub fn with_disconnect_on_read_timeout(mut self, enabled: bool) -> Self {
        self.disconnect_on_read_timeout = enabled;
        self
    }
}
