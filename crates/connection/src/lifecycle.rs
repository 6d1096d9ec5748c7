//! Foreground/background bridge.
//!
//! Watches the host application's lifecycle signal and asks the client to
//! reconnect when the app comes back to the foreground after having been
//! connected when it left. Backgrounding never closes the connection.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::manager::ConnectionManager;
use crate::types::ConnectionState;

/// Host application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// In the foreground and receiving input.
    Active,
    /// In the foreground but not receiving input (transitioning, overlays).
    Inactive,
    /// Not visible.
    Background,
}

/// What the bridge needs from a connection client.
pub trait Reconnectable: Send + Sync {
    fn state(&self) -> ConnectionState;
    fn reconnect(&self);
}

impl Reconnectable for ConnectionManager {
    fn state(&self) -> ConnectionState {
        ConnectionManager::state(self)
    }

    fn reconnect(&self) {
        ConnectionManager::reconnect(self)
    }
}

impl<T: Reconnectable + ?Sized> Reconnectable for Arc<T> {
    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    fn reconnect(&self) {
        (**self).reconnect()
    }
}

pub struct LifecycleBridge<C> {
    client: C,
    current: AppState,
    was_connected: bool,
}

impl<C: Reconnectable> LifecycleBridge<C> {
    /// The host is assumed to start in the foreground.
    pub fn new(client: C) -> Self {
        Self {
            client,
            current: AppState::Active,
            was_connected: false,
        }
    }

    /// Whether the client was connected when the app last went to the
    /// background and no foreground return has consumed that yet.
    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    /// Applies one lifecycle signal.
    pub fn on_app_state_change(&mut self, next: AppState) {
        let previous = self.current;
        self.current = next;
        if previous == next {
            return;
        }

        match next {
            AppState::Background => {
                self.was_connected = self.client.state() == ConnectionState::Connected;
                debug!(was_connected = self.was_connected, "app moved to background");
            }
            AppState::Active => {
                let state = self.client.state();
                let should_reconnect = self.was_connected
                    && matches!(state, ConnectionState::Disconnected | ConnectionState::Error);
                self.was_connected = false;
                if should_reconnect {
                    info!(%state, "foreground after losing connection, reconnecting");
                    self.client.reconnect();
                }
            }
            AppState::Inactive => {}
        }
    }

    /// Consumes lifecycle signals until the sender is dropped.
    pub async fn run(mut self, mut signals: watch::Receiver<AppState>) {
        loop {
            let next = *signals.borrow_and_update();
            self.on_app_state_change(next);
            if signals.changed().await.is_err() {
                break;
            }
        }
        debug!("lifecycle signal closed");
    }
}
