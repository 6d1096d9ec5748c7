//! Collaborators that log routed events to the console.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::info;

use companion_connection::{
    ChatStore, Collaborators, NotificationScheduler, StatusStore, TaskStore, TerminalStore,
};
use companion_protocol::messages::NotificationPayload;
use companion_protocol::types::{RemoteStatus, TerminalLine};

#[derive(Debug, Default)]
struct ChatState {
    active_session: Option<String>,
    /// Accumulated text of the message being streamed.
    streaming: Option<String>,
}

/// Logs every collaborator call and keeps the chat streaming buffer.
#[derive(Debug, Default)]
pub struct ConsoleStores {
    chat: Mutex<ChatState>,
}

impl ConsoleStores {
    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::default()
            .with_tasks(self.clone())
            .with_terminal(self.clone())
            .with_chat(self.clone())
            .with_status(self.clone())
            .with_notifications(self.clone())
    }

    fn chat(&self) -> std::sync::MutexGuard<'_, ChatState> {
        self.chat.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskStore for ConsoleStores {
    fn move_task(&self, task_id: &str, status: &str) {
        info!(task = task_id, status, "task moved");
    }

    fn patch_task(&self, task_id: &str, fields: &Map<String, Value>) {
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        info!(task = task_id, ?keys, "task updated");
    }
}

impl TerminalStore for ConsoleStores {
    fn append_line(&self, session_id: &str, line: &TerminalLine) {
        info!(session = session_id, kind = %line.line_type, "{}", line.content);
    }
}

impl ChatStore for ConsoleStores {
    fn active_session(&self) -> Option<String> {
        self.chat().active_session.clone()
    }

    fn switch_session(&self, session_id: &str) {
        let mut chat = self.chat();
        chat.active_session = Some(session_id.to_owned());
        chat.streaming = None;
        info!(session = session_id, "chat session switched");
    }

    fn is_streaming(&self) -> bool {
        self.chat().streaming.is_some()
    }

    fn start_streaming(&self) {
        self.chat().streaming = Some(String::new());
    }

    fn append_streaming(&self, content: &str) {
        if let Some(buffer) = self.chat().streaming.as_mut() {
            buffer.push_str(content);
        }
    }

    fn finalize_streaming(&self, content: &str, token_count: Option<u64>) {
        let streamed = self.chat().streaming.take().unwrap_or_default();
        info!(
            streamed_bytes = streamed.len(),
            ?token_count,
            "chat message: {content}"
        );
    }
}

impl StatusStore for ConsoleStores {
    fn set_status(&self, status: RemoteStatus, message: Option<&str>) {
        info!(%status, ?message, "connection status");
    }
}

impl NotificationScheduler for ConsoleStores {
    fn handle(&self, notification: &NotificationPayload) {
        info!(
            kind = %notification.notification_type,
            title = %notification.title,
            "notification: {}",
            notification.body
        );
    }
}
