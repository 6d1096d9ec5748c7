//! Real-time connection client.
//!
//! Keeps one WebSocket connection to a backend alive: a state machine with
//! capped exponential-backoff reconnection, an outbound keepalive, a
//! handshake timeout, and a router that dispatches inbound events to
//! caller-supplied collaborators.

pub mod collaborators;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod manager;
mod pumps;
pub(crate) mod reconnection;
pub mod router;
pub(crate) mod timers;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use collaborators::{
    ChatStore, Collaborators, NotificationScheduler, StatusStore, TaskStore, TerminalStore,
};
pub use credentials::{CredentialError, CredentialStore, FileCredentialStore};
pub use endpoint::Endpoint;
pub use error::ConnectionError;
pub use handlers::{ChannelHandlers, EventHandlers, NoopHandlers};
pub use lifecycle::{AppState, LifecycleBridge, Reconnectable};
pub use manager::ConnectionManager;
pub use router::{DropReason, Router};
pub use transport::{SocketPair, Transport, WsTransport};
pub use types::{ConnectionConfig, ConnectionEvent, ConnectionState, ReconnectConfig};
