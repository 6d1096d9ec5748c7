//! Reconnection policy: whether and when to try again after a failure.
//!
//! The manager consults [`decide`] on every abnormal close, failed open and
//! handshake timeout. The policy itself holds no state; the attempt counter
//! and the pending-timer slot live in the manager's core.

use std::time::Duration;

use crate::types::ReconnectConfig;

/// Outcome of a failure under the reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// A reconnect timer is already armed; the failure changes nothing.
    AlreadyPending,
    /// The retry ceiling is reached. Settle in the error state.
    GiveUp,
    /// Schedule attempt number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
}

/// Applies the policy to a failure.
///
/// `attempts` is the number of automatic attempts already made since the
/// last successful open. `pending` is whether a reconnect timer is armed.
pub(crate) fn decide(config: &ReconnectConfig, attempts: u32, pending: bool) -> RetryDecision {
    if pending {
        return RetryDecision::AlreadyPending;
    }
    if attempts >= config.max_attempts {
        return RetryDecision::GiveUp;
    }
    let attempt = attempts + 1;
    RetryDecision::Retry {
        attempt,
        delay: config.delay_for_attempt(attempt),
    }
}
