//! Error types for the connection client.

use tokio_tungstenite::tungstenite;

/// Errors surfaced through [`EventHandlers::on_error`](crate::EventHandlers::on_error).
///
/// None of these ever propagate out of the client; they only describe why a
/// state transition happened.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("connection timed out")]
    Timeout,
}
