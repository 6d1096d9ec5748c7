//! Timer slots: at most one live timer per role, cancel-before-start.

use tokio_util::sync::CancellationToken;

/// One-shot timer roles. The keepalive is recurring and never "fires".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerRole {
    Reconnect,
    ConnectTimeout,
}

/// Every timer a connection owns, one slot per role.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    pub(crate) reconnect: TimerSlot,
    pub(crate) keepalive: TimerSlot,
    pub(crate) connect_timeout: TimerSlot,
}

impl Timers {
    pub(crate) fn slot_mut(&mut self, role: TimerRole) -> &mut TimerSlot {
        match role {
            TimerRole::Reconnect => &mut self.reconnect,
            TimerRole::ConnectTimeout => &mut self.connect_timeout,
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        self.reconnect.cancel();
        self.keepalive.cancel();
        self.connect_timeout.cancel();
    }

    pub(crate) fn any_armed(&self) -> bool {
        self.reconnect.is_armed() || self.keepalive.is_armed() || self.connect_timeout.is_armed()
    }
}

/// Holds the cancellation token of the live timer for one role.
///
/// Arming a slot cancels whatever was armed before. Each arm gets a fresh
/// id so a timer that fires after being superseded can be recognised and
/// ignored.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    active: Option<(u64, CancellationToken)>,
    next_id: u64,
}

impl TimerSlot {
    /// Cancels any live timer and arms a new one.
    pub(crate) fn arm(&mut self) -> (u64, CancellationToken) {
        self.cancel();
        self.next_id += 1;
        let token = CancellationToken::new();
        self.active = Some((self.next_id, token.clone()));
        (self.next_id, token)
    }

    /// Cancels the live timer, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some((_, token)) = self.active.take() {
            token.cancel();
        }
    }

    /// Returns `true` while a timer is armed.
    pub(crate) fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    /// Clears the slot if `id` is the live timer. Returns `false` for a
    /// superseded or cancelled timer, whose firing must be ignored.
    pub(crate) fn fire(&mut self, id: u64) -> bool {
        match &self.active {
            Some((live, _)) if *live == id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }
}
