//! Wire protocol for the companion real-time channel.
//!
//! Every frame is a JSON envelope `{ "type", "payload", "timestamp" }`.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, MessageType};
pub use envelope::Envelope;
pub use messages::{
    ChatMessagePayload, ConnectionStatusPayload, DecodeError, InboundEvent, NotificationPayload,
    SyncPayload, TaskUpdatePayload, TaskUpdates, TerminalOutputPayload,
};
pub use types::{ChatContent, RemoteStatus, SyncKind, TerminalLine};
