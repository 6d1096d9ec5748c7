//! Console host loop: connection events, stdin commands, Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use companion_connection::{
    AppState, ChannelHandlers, ConnectionEvent, ConnectionManager, CredentialStore, Endpoint,
    FileCredentialStore, LifecycleBridge,
};
use companion_protocol::MessageType;

use crate::config::Settings;
use crate::console::ConsoleStores;

/// Environment variable that supplies (and stores) the session token.
pub const TOKEN_ENV: &str = "COMPANION_TOKEN";

/// One line typed on stdin.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Simulate the app moving to the background.
    Background,
    /// Simulate the app returning to the foreground.
    Foreground,
    Reconnect,
    Send {
        kind: MessageType,
        payload: serde_json::Value,
    },
    State,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let command = match word {
            "bg" => Command::Background,
            "fg" => Command::Foreground,
            "reconnect" => Command::Reconnect,
            "state" => Command::State,
            "quit" | "exit" => Command::Quit,
            "send" => {
                let (kind, json) = rest.trim().split_once(' ').unwrap_or((rest.trim(), "{}"));
                let kind: MessageType = serde_json::from_value(serde_json::Value::from(kind))
                    .context("invalid message kind")?;
                if kind == MessageType::Unknown {
                    bail!("unknown message kind");
                }
                let payload = serde_json::from_str(json).context("invalid JSON payload")?;
                Command::Send { kind, payload }
            }
            other => bail!("unknown command {other:?} (bg, fg, reconnect, send <kind> <json>, state, quit)"),
        };
        Ok(command)
    }
}

/// Runs until `quit`, end of stdin, or Ctrl-C.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let store = FileCredentialStore::new(settings.credentials_path()?)
        .context("failed to open credential store")?;
    if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
        store.save_token(&settings.account, &token)?;
        debug!(account = %settings.account, "stored token from environment");
    }
    let Some(token) = store.token(&settings.account) else {
        bail!(
            "no credential for account {:?}; set {TOKEN_ENV} once to store one",
            settings.account
        );
    };
    let endpoint = Endpoint::new(&settings.endpoint, &token).context("invalid endpoint")?;

    let stores = Arc::new(ConsoleStores::default());
    let manager = ConnectionManager::new(settings.connection_config(), stores.collaborators());
    let (handlers, mut events) = ChannelHandlers::new(256);
    manager.connect(endpoint, Some(Arc::new(handlers)));

    let (app_tx, app_rx) = watch::channel(AppState::Active);
    let bridge = tokio::spawn(LifecycleBridge::new(manager.clone()).run(app_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            Some(event) = events.recv() => log_event(&event),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(&manager, &app_tx, command),
                    Err(e) => warn!("{e:#}"),
                }
            }
        }
    }

    manager.disconnect();
    drop(app_tx);
    let _ = bridge.await;
    // Let the write pump flush the close frame.
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("bye");
    Ok(())
}

fn execute(manager: &ConnectionManager, app_tx: &watch::Sender<AppState>, command: Command) {
    match command {
        Command::Background => {
            let _ = app_tx.send(AppState::Background);
        }
        Command::Foreground => {
            let _ = app_tx.send(AppState::Active);
        }
        Command::Reconnect => manager.reconnect(),
        Command::Send { kind, payload } => {
            if !manager.send_event(kind, &payload) {
                warn!(state = %manager.state(), "message not sent");
            }
        }
        Command::State => info!(
            state = %manager.state(),
            attempts = manager.reconnect_attempts(),
            dropped = manager.dropped_frames(),
            "status"
        ),
        Command::Quit => {}
    }
}

fn log_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Connected => info!("connected"),
        ConnectionEvent::Disconnected { code, reason } => info!(code, %reason, "disconnected"),
        ConnectionEvent::Message(envelope) => {
            debug!(msg_type = ?envelope.msg_type, "message received")
        }
        ConnectionEvent::Error(e) => warn!("connection error: {e}"),
        ConnectionEvent::StateChanged(state) => info!(%state, "state"),
    }
}
