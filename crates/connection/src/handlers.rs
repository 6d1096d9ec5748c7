//! Caller-supplied event callbacks.

use tokio::sync::mpsc;
use tracing::warn;

use companion_protocol::envelope::Envelope;

use crate::error::ConnectionError;
use crate::types::{ConnectionEvent, ConnectionState};

/// Callbacks invoked by the [`ConnectionManager`](crate::ConnectionManager).
///
/// Every method has a no-op default so callers implement only what they
/// need. Callbacks run outside the manager's internal lock and may call back
/// into the manager; such calls are queued and their own callbacks are
/// delivered after the current one returns.
pub trait EventHandlers: Send + Sync {
    /// The socket opened.
    fn on_connect(&self) {}

    /// A socket that had opened is now closed.
    fn on_disconnect(&self, _code: u16, _reason: &str) {}

    /// A frame parsed into an envelope. Called for every kind, after the
    /// router has dispatched it.
    fn on_message(&self, _message: &Envelope) {}

    /// A transport error or handshake timeout occurred.
    fn on_error(&self, _error: &ConnectionError) {}

    /// The connection state changed. Fired exactly once per transition.
    fn on_state_change(&self, _state: ConnectionState) {}
}

/// Handlers that ignore every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandlers;

impl EventHandlers for NoopHandlers {}

/// Forwards every callback as a [`ConnectionEvent`] on an `mpsc` channel.
///
/// Uses `try_send`: if the receiver lags behind, events are dropped with a
/// warning rather than stalling the connection.
pub struct ChannelHandlers {
    events_tx: mpsc::Sender<ConnectionEvent>,
}

impl ChannelHandlers {
    /// Creates the handlers and the receiving end of the event stream.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(capacity);
        (Self { events_tx }, events_rx)
    }

    fn forward(&self, event: ConnectionEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            warn!("failed to forward connection event: {e}");
        }
    }
}

impl EventHandlers for ChannelHandlers {
    fn on_connect(&self) {
        self.forward(ConnectionEvent::Connected);
    }

    fn on_disconnect(&self, code: u16, reason: &str) {
        self.forward(ConnectionEvent::Disconnected {
            code,
            reason: reason.to_owned(),
        });
    }

    fn on_message(&self, message: &Envelope) {
        self.forward(ConnectionEvent::Message(message.clone()));
    }

    fn on_error(&self, error: &ConnectionError) {
        self.forward(ConnectionEvent::Error(error.to_string()));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.forward(ConnectionEvent::StateChanged(state));
    }
}
