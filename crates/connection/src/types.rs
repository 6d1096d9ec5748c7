//! Public types for the connection client.

use std::time::Duration;

use rand::Rng;

use companion_protocol::envelope::Envelope;

/// Connection state of the client. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket and no pending timers.
    Disconnected,
    /// WebSocket handshake in progress.
    Connecting,
    /// Socket open; `send` is permitted.
    Connected,
    /// Connection lost, a reconnect attempt is scheduled or starting.
    Reconnecting,
    /// Failed. Terminal once retries are exhausted.
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Events emitted through [`ChannelHandlers`](crate::handlers::ChannelHandlers).
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The socket opened.
    Connected,
    /// An open socket closed.
    Disconnected { code: u16, reason: String },
    /// A frame parsed into an envelope (any kind).
    Message(Envelope),
    /// A transport error or handshake timeout.
    Error(String),
    /// The client moved to a new state.
    StateChanged(ConnectionState),
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Maximum delay between attempts (backoff cap), before jitter.
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added to every delay.
    pub max_jitter: Duration,
    /// Number of automatic attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            max_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for a 1-based attempt number, without jitter:
    /// `min(base_delay * 2^(attempt-1), max_delay)`.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff delay plus uniform jitter in `[0, max_jitter]` to avoid
    /// thundering-herd reconnects.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay_for_attempt(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Timing and sizing configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub reconnect: ReconnectConfig,
    /// Interval between outbound keepalive pings while connected.
    pub keepalive_interval: Duration,
    /// How long a handshake may stay in `Connecting` before it is failed.
    pub connect_timeout: Duration,
    /// Inbound frames larger than this are dropped.
    pub max_message_size: usize,
    /// Capacity of the outbound frame queue.
    pub write_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_message_size: 10 * 1024 * 1024,
            write_buffer: 256,
        }
    }
}
