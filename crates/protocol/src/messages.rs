use serde::{Deserialize, Serialize};

use crate::constants::MessageType;
use crate::envelope::Envelope;
use crate::types::{ChatContent, RemoteStatus, SyncKind, TerminalLine};

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// A change to a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdatePayload {
    pub task_id: String,
    pub updates: TaskUpdates,
}

/// Field updates for a task. A present `status` means the task moved columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A line appended to a terminal session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalOutputPayload {
    pub session_id: String,
    pub line: TerminalLine,
}

/// A chat message, either a streaming fragment or a final message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub session_id: String,
    pub message: ChatContent,
    #[serde(default)]
    pub is_streaming: bool,
}

/// A push notification candidate. Display policy lives with the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Backend-reported connection status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatusPayload {
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cache invalidation hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    #[serde(rename = "type")]
    pub sync_type: SyncKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    #[serde(default)]
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Typed view of an inbound envelope
// ---------------------------------------------------------------------------

/// Errors decoding an envelope payload into its typed shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{kind:?} message has no payload")]
    MissingPayload { kind: MessageType },

    #[error("invalid {kind:?} payload: {source}")]
    Payload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

/// An inbound message decoded by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    TaskUpdate(TaskUpdatePayload),
    TerminalOutput(TerminalOutputPayload),
    ChatMessage(ChatMessagePayload),
    Notification(NotificationPayload),
    ConnectionStatus(ConnectionStatusPayload),
    Sync(SyncPayload),
    Ping,
    Pong,
    Unknown,
}

impl Envelope {
    /// Decodes the payload according to the envelope kind.
    ///
    /// Liveness and unknown kinds never fail; their payload is not inspected.
    pub fn decode(&self) -> Result<InboundEvent, DecodeError> {
        let kind = self.msg_type;
        Ok(match kind {
            MessageType::TaskUpdate => InboundEvent::TaskUpdate(self.required(kind)?),
            MessageType::TerminalOutput => InboundEvent::TerminalOutput(self.required(kind)?),
            MessageType::ChatMessage => InboundEvent::ChatMessage(self.required(kind)?),
            MessageType::Notification => InboundEvent::Notification(self.required(kind)?),
            MessageType::ConnectionStatus => {
                InboundEvent::ConnectionStatus(self.required(kind)?)
            }
            MessageType::Sync => InboundEvent::Sync(self.required(kind)?),
            MessageType::Ping => InboundEvent::Ping,
            MessageType::Pong => InboundEvent::Pong,
            MessageType::Unknown => InboundEvent::Unknown,
        })
    }

    fn required<T: for<'de> Deserialize<'de>>(&self, kind: MessageType) -> Result<T, DecodeError> {
        self.parse_payload::<T>()
            .map_err(|source| DecodeError::Payload { kind, source })?
            .ok_or(DecodeError::MissingPayload { kind })
    }
}
