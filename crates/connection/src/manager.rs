//! Connection manager: owns the socket, the state machine and every timer.
//!
//! All mutable state lives in one [`Core`] behind a synchronous mutex that is
//! never held across an `.await` or while user callbacks run. Socket tasks
//! carry the generation number of the socket they serve; anything they
//! report after that socket was replaced or torn down is ignored.
//!
//! Callbacks are queued while the lock is held and delivered afterwards in
//! FIFO order by [`Inner::flush`]. A callback that calls back into the
//! manager only queues more notices, which the outer flush delivers once the
//! current callback returns.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use companion_protocol::constants::{CLOSE_NORMAL, MessageType};
use companion_protocol::envelope::Envelope;
use companion_protocol::types::RemoteStatus;

use crate::collaborators::Collaborators;
use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::handlers::{EventHandlers, NoopHandlers};
use crate::pumps::keepalive::keepalive_pump;
use crate::pumps::read::{ReadOutcome, read_pump};
use crate::pumps::write::write_pump;
use crate::reconnection::{RetryDecision, decide};
use crate::router::Router;
use crate::timers::{TimerRole, Timers};
use crate::transport::{SocketPair, Transport, WsTransport};
use crate::types::{ConnectionConfig, ConnectionState};

const CLIENT_DISCONNECT: &str = "client disconnect";

/// Real-time connection client.
///
/// Cheap to clone; clones share the same connection. Every method is
/// synchronous but must be called from within a Tokio runtime, since
/// opening a socket and arming timers spawn tasks.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    router: Router,
    core: Mutex<Core>,
    state_tx: watch::Sender<ConnectionState>,
}

struct Core {
    state: ConnectionState,
    endpoint: Option<Endpoint>,
    handlers: Arc<dyn EventHandlers>,
    /// Automatic attempts since the last successful open.
    attempts: u32,
    generation: u64,
    socket: Option<Socket>,
    timers: Timers,
    outbox: VecDeque<Outgoing>,
    dispatching: bool,
}

/// The live socket, from the moment its open starts.
struct Socket {
    generation: u64,
    id: Uuid,
    cancel: CancellationToken,
    /// Set once the handshake completes.
    writer: Option<mpsc::Sender<tungstenite::Message>>,
}

enum Notice {
    State(ConnectionState),
    Connect,
    Disconnect { code: u16, reason: String },
    Error(ConnectionError),
    Message(Envelope),
    Status(RemoteStatus, Option<String>),
}

/// A notice bound to the handlers that were registered when it was raised.
struct Outgoing {
    handlers: Arc<dyn EventHandlers>,
    notice: Notice,
}

impl Core {
    fn emit(&mut self, notice: Notice) {
        self.outbox.push_back(Outgoing {
            handlers: self.handlers.clone(),
            notice,
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    /// Cancels the socket and its keepalive and handshake timers. Returns
    /// `true` if the socket had opened.
    fn teardown_socket(&mut self) -> bool {
        self.timers.keepalive.cancel();
        self.timers.connect_timeout.cancel();
        match self.socket.take() {
            Some(socket) => {
                trace!(socket = %socket.id, "tearing down socket");
                socket.cancel.cancel();
                socket.writer.is_some()
            }
            None => false,
        }
    }
}

impl ConnectionManager {
    /// Creates a manager backed by the WebSocket transport.
    pub fn new(config: ConnectionConfig, collaborators: Collaborators) -> Self {
        let transport = Arc::new(WsTransport::new(config.max_message_size));
        Self::with_transport(config, collaborators, transport)
    }

    /// Creates a manager with a custom transport.
    pub fn with_transport(
        config: ConnectionConfig,
        collaborators: Collaborators,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let router = Router::new(collaborators, config.max_message_size);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                router,
                core: Mutex::new(Core {
                    state: ConnectionState::Disconnected,
                    endpoint: None,
                    handlers: Arc::new(NoopHandlers),
                    attempts: 0,
                    generation: 0,
                    socket: None,
                    timers: Timers::default(),
                    outbox: VecDeque::new(),
                    dispatching: false,
                }),
                state_tx,
            }),
        }
    }

    /// Starts connecting to `endpoint`.
    ///
    /// Ignored while already connecting or connected: no second socket is
    /// opened and the retry counter is untouched. Otherwise the retry
    /// counter is reset and any pending reconnect is cancelled. When
    /// `handlers` is `None` the previously registered handlers are kept.
    pub fn connect(&self, endpoint: Endpoint, handlers: Option<Arc<dyn EventHandlers>>) {
        let inner = &self.inner;
        {
            let mut core = inner.lock();
            if matches!(
                core.state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                debug!(state = %core.state, "connect ignored");
                return;
            }
            info!(endpoint = %endpoint, "connecting");
            core.endpoint = Some(endpoint);
            if let Some(handlers) = handlers {
                core.handlers = handlers;
            }
            core.attempts = 0;
            core.timers.reconnect.cancel();
            inner.open_socket(&mut core);
        }
        inner.flush();
    }

    /// Closes the connection with code 1000 and cancels every timer.
    ///
    /// Safe from any state. No automatic reconnect follows.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        {
            let mut core = inner.lock();
            core.timers.cancel_all();
            if core.teardown_socket() {
                core.emit(Notice::Disconnect {
                    code: CLOSE_NORMAL,
                    reason: CLIENT_DISCONNECT.to_owned(),
                });
            }
            if inner.transition(&mut core, ConnectionState::Disconnected) {
                info!("disconnected");
            }
            core.emit(Notice::Status(RemoteStatus::Disconnected, None));
        }
        inner.flush();
    }

    /// Tears down the current socket and opens a fresh one to the stored
    /// endpoint. Does nothing if no endpoint was ever given.
    ///
    /// The retry counter is not reset, so repeated failures still reach the
    /// ceiling.
    pub fn reconnect(&self) {
        let inner = &self.inner;
        {
            let mut core = inner.lock();
            if core.endpoint.is_none() {
                warn!("reconnect requested without an endpoint");
                return;
            }
            core.timers.reconnect.cancel();
            if core.teardown_socket() {
                core.emit(Notice::Disconnect {
                    code: CLOSE_NORMAL,
                    reason: CLIENT_DISCONNECT.to_owned(),
                });
            }
            info!(attempts = core.attempts, "reconnecting on request");
            inner.transition(&mut core, ConnectionState::Reconnecting);
            inner.open_socket(&mut core);
        }
        inner.flush();
    }

    /// Serializes `message` to JSON and queues it as one text frame.
    ///
    /// Returns `false` without sending unless the state is `Connected`, and
    /// also when serialization fails or the outbound queue is full.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let writer = {
            let core = self.inner.lock();
            if core.state != ConnectionState::Connected {
                debug!(state = %core.state, "send refused: not connected");
                return false;
            }
            match core.socket.as_ref().and_then(|s| s.writer.clone()) {
                Some(writer) => writer,
                None => return false,
            }
        };

        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize outbound message: {e}");
                return false;
            }
        };

        match writer.try_send(tungstenite::Message::Text(json.into())) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to queue outbound message: {e}");
                false
            }
        }
    }

    /// Wraps `payload` in an envelope of kind `msg_type` and sends it.
    pub fn send_event<T: Serialize>(&self, msg_type: MessageType, payload: &T) -> bool {
        match Envelope::new(msg_type, Some(payload)) {
            Ok(envelope) => self.send(&envelope),
            Err(e) => {
                warn!(?msg_type, "failed to build envelope: {e}");
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Automatic reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// Watches state changes without registering handlers.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Inbound frames dropped as oversized, malformed or unrecognised.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.router.dropped()
    }

    #[cfg(test)]
    fn has_pending_timers(&self) -> bool {
        self.inner.lock().timers.any_armed()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next`, queueing exactly one state notice. Returns `false`
    /// if the state was already `next`.
    fn transition(&self, core: &mut Core, next: ConnectionState) -> bool {
        if core.state == next {
            return false;
        }
        debug!(from = %core.state, to = %next, "state change");
        core.state = next;
        self.state_tx.send_replace(next);
        core.emit(Notice::State(next));
        true
    }

    /// Replaces any socket with a fresh one and starts its handshake.
    fn open_socket(self: &Arc<Self>, core: &mut Core) {
        core.teardown_socket();
        let Some(endpoint) = core.endpoint.clone() else {
            return;
        };

        core.generation += 1;
        let generation = core.generation;
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        core.socket = Some(Socket {
            generation,
            id,
            cancel: cancel.clone(),
            writer: None,
        });

        self.transition(core, ConnectionState::Connecting);
        self.arm_timer(core, TimerRole::ConnectTimeout, self.config.connect_timeout);

        debug!(socket = %id, endpoint = %endpoint, "opening socket");
        let open = self.transport.open(endpoint.as_str());
        tokio::spawn(socket_task(
            Arc::downgrade(self),
            generation,
            id,
            open,
            cancel,
        ));
    }

    /// Arms the one-shot timer for `role`, replacing any live one.
    fn arm_timer(self: &Arc<Self>, core: &mut Core, role: TimerRole, after: Duration) {
        let (id, token) = core.timers.slot_mut(role).arm();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_timer(role, id);
                    }
                }
            }
        });
    }

    fn on_timer(self: &Arc<Self>, role: TimerRole, id: u64) {
        {
            let mut core = self.lock();
            if !core.timers.slot_mut(role).fire(id) {
                return;
            }
            match role {
                TimerRole::Reconnect => {
                    if core.state == ConnectionState::Reconnecting {
                        debug!(attempt = core.attempts, "reconnect timer fired");
                        self.open_socket(&mut core);
                    }
                }
                TimerRole::ConnectTimeout => {
                    if core.state == ConnectionState::Connecting {
                        warn!(
                            timeout_ms = self.config.connect_timeout.as_millis() as u64,
                            "handshake timed out"
                        );
                        self.fail(&mut core, ConnectionError::Timeout);
                    }
                }
            }
        }
        self.flush();
    }

    /// Handshake completed. Returns `false` if the socket is stale.
    fn on_open(
        self: &Arc<Self>,
        generation: u64,
        writer: mpsc::Sender<tungstenite::Message>,
    ) -> bool {
        {
            let mut core = self.lock();
            if !core.is_current(generation) {
                return false;
            }
            core.timers.connect_timeout.cancel();
            core.attempts = 0;
            if let Some(socket) = core.socket.as_mut() {
                socket.writer = Some(writer.clone());
            }

            let (_, token) = core.timers.keepalive.arm();
            tokio::spawn(keepalive_pump(
                writer,
                self.config.keepalive_interval,
                token,
            ));

            info!("connected");
            self.transition(&mut core, ConnectionState::Connected);
            core.emit(Notice::Connect);
            core.emit(Notice::Status(RemoteStatus::Connected, None));
        }
        self.flush();
        true
    }

    fn on_open_failed(self: &Arc<Self>, generation: u64, error: ConnectionError) {
        {
            let mut core = self.lock();
            if !core.is_current(generation) {
                return;
            }
            warn!("connection failed: {error}");
            self.fail(&mut core, error);
        }
        self.flush();
    }

    fn on_frame(&self, generation: u64, text: &str) {
        if !self.lock().is_current(generation) {
            return;
        }
        let Some(envelope) = self.router.route(text) else {
            return;
        };
        self.lock().emit(Notice::Message(envelope));
        self.flush();
    }

    fn on_closed(
        self: &Arc<Self>,
        generation: u64,
        code: u16,
        reason: String,
        error: Option<tungstenite::Error>,
    ) {
        {
            let mut core = self.lock();
            if !core.is_current(generation) {
                return;
            }
            core.teardown_socket();
            info!(code, reason = %reason, "connection closed");

            if let Some(error) = error {
                core.emit(Notice::Error(ConnectionError::Ws(error)));
                self.transition(&mut core, ConnectionState::Error);
            }
            core.emit(Notice::Disconnect { code, reason });

            if code == CLOSE_NORMAL {
                self.transition(&mut core, ConnectionState::Disconnected);
                core.emit(Notice::Status(RemoteStatus::Disconnected, None));
            } else {
                self.schedule_reconnect(&mut core);
            }
        }
        self.flush();
    }

    /// Open failure or handshake timeout: abandon the socket, surface the
    /// error, then let the reconnection policy decide.
    fn fail(self: &Arc<Self>, core: &mut Core, error: ConnectionError) {
        core.teardown_socket();
        let message = error.to_string();
        core.emit(Notice::Error(error));
        self.transition(core, ConnectionState::Error);
        core.emit(Notice::Status(RemoteStatus::Error, Some(message)));
        self.schedule_reconnect(core);
    }

    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core) {
        let pending = core.timers.reconnect.is_armed();
        match decide(&self.config.reconnect, core.attempts, pending) {
            RetryDecision::AlreadyPending => {
                debug!("reconnect already scheduled");
            }
            RetryDecision::GiveUp => {
                warn!(attempts = core.attempts, "giving up after max reconnect attempts");
                self.transition(core, ConnectionState::Error);
                core.emit(Notice::Status(
                    RemoteStatus::Error,
                    Some(format!(
                        "gave up after {} reconnect attempts",
                        core.attempts
                    )),
                ));
            }
            RetryDecision::Retry { attempt, delay } => {
                core.attempts = attempt;
                info!(
                    attempt,
                    max_attempts = self.config.reconnect.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.transition(core, ConnectionState::Reconnecting);
                self.arm_timer(core, TimerRole::Reconnect, delay);
            }
        }
    }

    /// Delivers queued notices outside the lock, in order. Re-entrant calls
    /// return immediately and leave their notices to the outer loop.
    fn flush(&self) {
        {
            let mut core = self.lock();
            if core.dispatching {
                return;
            }
            core.dispatching = true;
        }
        loop {
            let next = {
                let mut core = self.lock();
                match core.outbox.pop_front() {
                    Some(next) => next,
                    None => {
                        core.dispatching = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, outgoing: Outgoing) {
        let handlers = &outgoing.handlers;
        match outgoing.notice {
            Notice::State(state) => handlers.on_state_change(state),
            Notice::Connect => handlers.on_connect(),
            Notice::Disconnect { code, reason } => handlers.on_disconnect(code, &reason),
            Notice::Error(error) => handlers.on_error(&error),
            Notice::Message(envelope) => handlers.on_message(&envelope),
            Notice::Status(status, message) => self
                .router
                .collaborators()
                .report_status(status, message.as_deref()),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        core.timers.cancel_all();
        core.teardown_socket();
    }
}

/// Drives one socket from handshake to close.
async fn socket_task(
    inner: Weak<Inner>,
    generation: u64,
    id: Uuid,
    open: BoxFuture<'static, Result<SocketPair, ConnectionError>>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        _ = cancel.cancelled() => return,
        result = open => result,
    };

    let pair = match result {
        Ok(pair) => pair,
        Err(e) => {
            if let Some(inner) = inner.upgrade() {
                inner.on_open_failed(generation, e);
            }
            return;
        }
    };

    let write_tx = {
        let Some(strong) = inner.upgrade() else {
            return;
        };
        let (write_tx, write_rx) = mpsc::channel(strong.config.write_buffer.max(1));
        tokio::spawn(write_pump(pair.sink, write_rx, cancel.clone()));
        if !strong.on_open(generation, write_tx.clone()) {
            debug!(socket = %id, "discarding stale socket");
            cancel.cancel();
            return;
        }
        write_tx
    };

    let outcome = read_pump(pair.stream, write_tx, cancel.clone(), |text| {
        if let Some(inner) = inner.upgrade() {
            inner.on_frame(generation, text);
        }
    })
    .await;

    match outcome {
        ReadOutcome::Cancelled => trace!(socket = %id, "read pump cancelled"),
        ReadOutcome::Closed {
            code,
            reason,
            error,
        } => {
            if let Some(inner) = inner.upgrade() {
                inner.on_closed(generation, code, reason, error);
            }
        }
    }
}
