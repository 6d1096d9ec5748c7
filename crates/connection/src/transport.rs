//! Socket transport abstraction and the tungstenite-backed implementation.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tracing::debug;

use crate::error::ConnectionError;

/// Outbound half of an open socket.
pub type WsSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Inbound half of an open socket.
pub type WsStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

/// Both halves of a socket whose handshake completed.
pub struct SocketPair {
    pub sink: WsSink,
    pub stream: WsStream,
}

/// Opens sockets. The returned future resolves once the handshake completes
/// (the "open" event) or fails (the "error" event).
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<SocketPair, ConnectionError>>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    max_message_size: usize,
}

impl WsTransport {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<SocketPair, ConnectionError>> {
        let url = url.to_owned();
        let max = self.max_message_size;
        Box::pin(async move {
            let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
            ws_config.max_message_size = Some(max);
            ws_config.max_frame_size = Some(max);
            let (ws_stream, response) =
                tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false)
                    .await?;
            debug!(status = %response.status(), "websocket handshake complete");
            let (write, read) = ws_stream.split();
            Ok(SocketPair {
                sink: Box::pin(write),
                stream: Box::pin(read),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ws_transport_refused_connection_is_error() {
        // Port 9 on loopback is reserved (discard) and nothing listens there.
        let transport = WsTransport::new(1024);
        let result = transport.open("ws://127.0.0.1:9/ws").await;
        assert!(matches!(result, Err(ConnectionError::Ws(_))));
    }

    #[tokio::test]
    async fn ws_transport_rejects_bad_scheme() {
        let transport = WsTransport::new(1024);
        let result = transport.open("http://127.0.0.1:9/ws").await;
        assert!(result.is_err());
    }
}
