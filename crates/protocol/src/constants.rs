use serde::{Deserialize, Serialize};

/// Close code for an intentional, orderly shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code synthesized when a close frame carried no status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the socket went away without a close frame.
///
/// Never sent on the wire; the client synthesizes it for dropped streams,
/// refused connections, and handshake timeouts.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Query parameter carrying the session credential in the handshake URL.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Real-time message kind carried in the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Domain events pushed by the backend
    #[serde(rename = "task_update")]
    TaskUpdate,
    #[serde(rename = "terminal_output")]
    TerminalOutput,
    #[serde(rename = "chat_message")]
    ChatMessage,
    #[serde(rename = "notification")]
    Notification,
    #[serde(rename = "connection_status")]
    ConnectionStatus,
    #[serde(rename = "sync")]
    Sync,

    // Liveness
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,

    /// Forward compatibility: unknown kinds deserialize here.
    ///
    /// Inbound only; never constructed for outbound messages.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Returns `true` for the keepalive kinds, which carry no domain data.
    pub fn is_liveness(self) -> bool {
        matches!(self, MessageType::Ping | MessageType::Pong)
    }
}
