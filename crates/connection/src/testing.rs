//! Test doubles: scripted transport, recording handlers and collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use companion_protocol::constants::MessageType;
use companion_protocol::envelope::Envelope;
use companion_protocol::messages::NotificationPayload;
use companion_protocol::types::{RemoteStatus, TerminalLine};

use crate::collaborators::{
    ChatStore, Collaborators, NotificationScheduler, StatusStore, TaskStore, TerminalStore,
};
use crate::error::ConnectionError;
use crate::handlers::EventHandlers;
use crate::transport::{SocketPair, Transport};
use crate::types::{ConnectionConfig, ConnectionState, ReconnectConfig};

/// Lets spawned tasks run without advancing the paused clock.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Deterministic timings: 1 s base, 8 s cap, no jitter, 3 attempts.
pub(crate) fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        reconnect: ReconnectConfig {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_jitter: Duration::ZERO,
            max_attempts: 3,
        },
        keepalive_interval: Duration::from_secs(30),
        connect_timeout: Duration::from_secs(10),
        ..ConnectionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// What the next `open` call does.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// Handshake completes immediately; a [`MockPeer`] is handed to the test.
    Accept,
    /// Handshake fails with connection refused.
    Refuse,
    /// Handshake never completes.
    Hang,
}

pub(crate) struct MockTransport {
    script: Mutex<VecDeque<Script>>,
    opens: AtomicUsize,
    urls: Mutex<Vec<String>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        })
    }

    /// Queues behaviours for upcoming opens. Unscripted opens accept.
    pub(crate) fn script(&self, steps: impl IntoIterator<Item = Script>) {
        self.script.lock().unwrap().extend(steps);
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Waits for the next accepted socket.
    pub(crate) async fn next_peer(&self) -> MockPeer {
        self.peers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("transport dropped")
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<SocketPair, ConnectionError>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_owned());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Accept);

        match step {
            Script::Accept => {
                let (pair, peer) = socket_pair();
                let _ = self.peers_tx.send(peer);
                Box::pin(async move { Ok(pair) })
            }
            Script::Refuse => Box::pin(async {
                Err(ConnectionError::Ws(tungstenite::Error::Io(
                    std::io::ErrorKind::ConnectionRefused.into(),
                )))
            }),
            Script::Hang => Box::pin(futures_util::future::pending()),
        }
    }
}

type Frame = Result<tungstenite::Message, tungstenite::Error>;

fn socket_pair() -> (SocketPair, MockPeer) {
    let (to_client, client_rx) = mpsc::unbounded_channel::<Frame>();
    let (client_tx, from_client) = mpsc::unbounded_channel::<tungstenite::Message>();

    let stream = stream::unfold(client_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });
    let sink = sink::unfold(client_tx, |tx, msg: tungstenite::Message| async move {
        tx.send(msg)
            .map_err(|_| tungstenite::Error::ConnectionClosed)?;
        Ok::<_, tungstenite::Error>(tx)
    });

    let pair = SocketPair {
        sink: Box::pin(sink),
        stream: Box::pin(stream),
    };
    (
        pair,
        MockPeer {
            to_client: Some(to_client),
            from_client,
        },
    )
}

/// Server side of a mock socket.
pub(crate) struct MockPeer {
    to_client: Option<mpsc::UnboundedSender<Frame>>,
    from_client: mpsc::UnboundedReceiver<tungstenite::Message>,
}

impl MockPeer {
    pub(crate) fn send_text(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Ok(tungstenite::Message::Text(text.into())));
        }
    }

    /// Sends a close frame with `code`.
    pub(crate) fn close(&self, code: u16) {
        if let Some(tx) = &self.to_client {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: String::from("peer close").into(),
            };
            let _ = tx.send(Ok(tungstenite::Message::Close(Some(frame))));
        }
    }

    /// Ends the stream without a close frame.
    pub(crate) fn drop_connection(&mut self) {
        self.to_client = None;
    }

    /// Next frame written by the client, if the client is still writing.
    pub(crate) async fn next_frame(&mut self) -> Option<tungstenite::Message> {
        self.from_client.recv().await
    }

    /// Next text frame written by the client, skipping control frames.
    pub(crate) async fn next_text(&mut self) -> Option<String> {
        while let Some(frame) = self.from_client.recv().await {
            if let tungstenite::Message::Text(t) = frame {
                return Some(t.as_str().to_owned());
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded {
    Connect,
    Disconnect(u16),
    Message(MessageType),
    Error(String),
    State(ConnectionState),
}

#[derive(Default)]
pub(crate) struct RecordingHandlers {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingHandlers {
    pub(crate) fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn states(&self) -> Vec<ConnectionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, wanted: &Recorded) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventHandlers for RecordingHandlers {
    fn on_connect(&self) {
        self.push(Recorded::Connect);
    }

    fn on_disconnect(&self, code: u16, _reason: &str) {
        self.push(Recorded::Disconnect(code));
    }

    fn on_message(&self, message: &Envelope) {
        self.push(Recorded::Message(message.msg_type));
    }

    fn on_error(&self, error: &ConnectionError) {
        self.push(Recorded::Error(error.to_string()));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.push(Recorded::State(state));
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Implements every collaborator and records calls as strings.
#[derive(Default)]
pub(crate) struct RecordingStores {
    calls: Mutex<Vec<String>>,
    active_session: Mutex<Option<String>>,
    streaming: AtomicBool,
}

impl RecordingStores {
    pub(crate) fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::default()
            .with_tasks(self.clone())
            .with_terminal(self.clone())
            .with_chat(self.clone())
            .with_status(self.clone())
            .with_notifications(self.clone())
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn set_active_session(&self, id: &str) {
        *self.active_session.lock().unwrap() = Some(id.to_owned());
    }

    /// Calls made to the status collaborator only.
    pub(crate) fn statuses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("set_status"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TaskStore for RecordingStores {
    fn move_task(&self, task_id: &str, status: &str) {
        self.record(format!("move_task {task_id} {status}"));
    }

    fn patch_task(&self, task_id: &str, fields: &serde_json::Map<String, serde_json::Value>) {
        let json = serde_json::to_string(fields).unwrap();
        self.record(format!("patch_task {task_id} {json}"));
    }
}

impl TerminalStore for RecordingStores {
    fn append_line(&self, session_id: &str, line: &TerminalLine) {
        self.record(format!(
            "append_line {session_id} {} {}",
            line.line_type, line.content
        ));
    }
}

impl ChatStore for RecordingStores {
    fn active_session(&self) -> Option<String> {
        self.active_session.lock().unwrap().clone()
    }

    fn switch_session(&self, session_id: &str) {
        self.set_active_session(session_id);
        self.record(format!("switch_session {session_id}"));
    }

    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    fn start_streaming(&self) {
        self.streaming.store(true, Ordering::SeqCst);
        self.record("start_streaming".into());
    }

    fn append_streaming(&self, content: &str) {
        self.record(format!("append_streaming {content}"));
    }

    fn finalize_streaming(&self, content: &str, token_count: Option<u64>) {
        self.streaming.store(false, Ordering::SeqCst);
        self.record(format!("finalize_streaming {content} {token_count:?}"));
    }
}

impl StatusStore for RecordingStores {
    fn set_status(&self, status: RemoteStatus, message: Option<&str>) {
        self.record(format!("set_status {status} {message:?}"));
    }
}

impl NotificationScheduler for RecordingStores {
    fn handle(&self, notification: &NotificationPayload) {
        self.record(format!(
            "notify {} {}",
            notification.notification_type, notification.title
        ));
    }
}
