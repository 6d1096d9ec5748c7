//! Interfaces of the application stores the router notifies.
//!
//! The connection client never owns domain state; it only forwards routed
//! events to these collaborators.

use std::sync::Arc;

use companion_protocol::messages::NotificationPayload;
use companion_protocol::types::{RemoteStatus, TerminalLine};

/// Task board store.
pub trait TaskStore: Send + Sync {
    /// Moves a task to a new status column.
    fn move_task(&self, task_id: &str, status: &str);

    /// Applies field updates that do not change the status.
    fn patch_task(&self, task_id: &str, fields: &serde_json::Map<String, serde_json::Value>);
}

/// Terminal output buffers.
pub trait TerminalStore: Send + Sync {
    fn append_line(&self, session_id: &str, line: &TerminalLine);
}

/// Chat sessions and the in-flight streaming message.
pub trait ChatStore: Send + Sync {
    /// Currently selected session, if any.
    fn active_session(&self) -> Option<String>;

    fn switch_session(&self, session_id: &str);

    /// Returns `true` while a streaming message is being accumulated.
    fn is_streaming(&self) -> bool;

    fn start_streaming(&self);

    fn append_streaming(&self, content: &str);

    /// Completes the streaming message with its final content.
    fn finalize_streaming(&self, content: &str, token_count: Option<u64>);
}

/// Connection status shown to the user.
pub trait StatusStore: Send + Sync {
    fn set_status(&self, status: RemoteStatus, message: Option<&str>);
}

/// Push notification scheduling. Decides whether and how to display.
pub trait NotificationScheduler: Send + Sync {
    fn handle(&self, notification: &NotificationPayload);
}

/// Set of collaborators handed to the router. Absent ones drop their events.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub tasks: Option<Arc<dyn TaskStore>>,
    pub terminal: Option<Arc<dyn TerminalStore>>,
    pub chat: Option<Arc<dyn ChatStore>>,
    pub status: Option<Arc<dyn StatusStore>>,
    pub notifications: Option<Arc<dyn NotificationScheduler>>,
}

impl Collaborators {
    pub fn with_tasks(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_terminal(mut self, terminal: Arc<dyn TerminalStore>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatStore>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusStore>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationScheduler>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Reports a status to the status collaborator, if present.
    pub(crate) fn report_status(&self, status: RemoteStatus, message: Option<&str>) {
        if let Some(store) = &self.status {
            store.set_status(status, message);
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("tasks", &self.tasks.is_some())
            .field("terminal", &self.terminal.is_some())
            .field("chat", &self.chat.is_some())
            .field("status", &self.status.is_some())
            .field("notifications", &self.notifications.is_some())
            .finish()
    }
}
