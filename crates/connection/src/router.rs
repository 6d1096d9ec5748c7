//! Inbound message router.
//!
//! Parses text frames into envelopes and dispatches each recognised kind
//! to exactly one collaborator. Malformed or unrecognised input is dropped
//! silently; [`Router::dropped`] counts drops so tests and diagnostics can
//! observe them.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use companion_protocol::envelope::Envelope;
use companion_protocol::messages::{ChatMessagePayload, InboundEvent, TaskUpdatePayload};

use crate::collaborators::Collaborators;

/// Why an inbound frame was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Larger than the configured maximum message size.
    Oversized,
    /// Not a JSON envelope.
    Malformed,
    /// Envelope kind is not recognised.
    UnknownKind,
    /// Recognised kind with a payload of the wrong shape.
    InvalidPayload,
}

pub struct Router {
    collaborators: Collaborators,
    max_message_size: usize,
    dropped: AtomicU64,
}

impl Router {
    pub fn new(collaborators: Collaborators, max_message_size: usize) -> Self {
        Self {
            collaborators,
            max_message_size,
            dropped: AtomicU64::new(0),
        }
    }

    /// Number of frames dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Routes one text frame.
    ///
    /// Returns the envelope whenever the frame parsed, whatever its kind, so
    /// the caller can hand it to `on_message`. Never panics on bad input.
    pub fn route(&self, text: &str) -> Option<Envelope> {
        if text.len() > self.max_message_size {
            self.drop_frame(DropReason::Oversized, &format!("{} bytes", text.len()));
            return None;
        }

        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                self.drop_frame(DropReason::Malformed, &e.to_string());
                return None;
            }
        };

        trace!(msg_type = ?envelope.msg_type, "received message");

        match envelope.decode() {
            Ok(InboundEvent::Unknown) => self.drop_frame(DropReason::UnknownKind, "unknown type"),
            Ok(event) => self.dispatch(event),
            Err(e) => self.drop_frame(DropReason::InvalidPayload, &e.to_string()),
        }

        Some(envelope)
    }

    fn dispatch(&self, event: InboundEvent) {
        let c = &self.collaborators;
        match event {
            InboundEvent::TaskUpdate(p) => self.task_update(p),
            InboundEvent::TerminalOutput(p) => {
                if let Some(terminal) = &c.terminal {
                    terminal.append_line(&p.session_id, &p.line);
                }
            }
            InboundEvent::ChatMessage(p) => self.chat_message(p),
            InboundEvent::Notification(p) => {
                if let Some(scheduler) = &c.notifications {
                    scheduler.handle(&p);
                }
            }
            InboundEvent::ConnectionStatus(p) => {
                c.report_status(p.status, p.message.as_deref());
            }
            InboundEvent::Sync(p) => {
                // Reserved for cache invalidation.
                debug!(sync_type = ?p.sync_type, entities = ?p.entities, "sync requested");
            }
            InboundEvent::Ping | InboundEvent::Pong => trace!("liveness message"),
            InboundEvent::Unknown => {}
        }
    }

    fn task_update(&self, p: TaskUpdatePayload) {
        let Some(tasks) = &self.collaborators.tasks else {
            return;
        };
        match &p.updates.status {
            Some(status) => tasks.move_task(&p.task_id, status),
            None => tasks.patch_task(&p.task_id, &p.updates.fields),
        }
    }

    fn chat_message(&self, p: ChatMessagePayload) {
        let Some(chat) = &self.collaborators.chat else {
            return;
        };
        if chat.active_session().as_deref() != Some(p.session_id.as_str()) {
            chat.switch_session(&p.session_id);
        }
        if p.is_streaming {
            if !chat.is_streaming() {
                chat.start_streaming();
            }
            chat.append_streaming(&p.message.content);
        } else if chat.is_streaming() {
            chat.finalize_streaming(&p.message.content, p.message.token_count);
        } else {
            debug!(session = %p.session_id, "final chat message without an active stream");
        }
    }

    fn drop_frame(&self, reason: DropReason, detail: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        debug!(?reason, detail, "dropping inbound frame");
    }
}
