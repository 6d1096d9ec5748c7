use serde::{Deserialize, Serialize};

/// Connection status as reported by the backend in `connection_status`
/// messages. Distinct from the client's own connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Connected,
    Connecting,
    Disconnected,
    Error,
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemoteStatus::Connected => "connected",
            RemoteStatus::Connecting => "connecting",
            RemoteStatus::Disconnected => "disconnected",
            RemoteStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Scope of a `sync` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Full,
    Partial,
}

/// A single line of terminal output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalLine {
    /// Stream the line came from (`stdout`, `stderr`, `system`, ...).
    #[serde(rename = "type")]
    pub line_type: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Body of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContent {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
}
