//! WebSocket read pump: hands text frames to the router and reports how
//! the socket ended.

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use companion_protocol::constants::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};

/// How a read pump finished.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// The socket was torn down locally; nothing to report.
    Cancelled,
    /// The peer closed, the stream ended, or a read error occurred.
    Closed {
        code: u16,
        reason: String,
        error: Option<tungstenite::Error>,
    },
}

/// Reads frames until the socket ends or `cancel` fires.
///
/// Text frames go to `on_text`. Transport-level pings are answered with
/// pongs. There is no read deadline: dead-peer detection is left to the
/// transport and the backend.
pub(crate) async fn read_pump<S, F>(
    mut read: S,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
    mut on_text: F,
) -> ReadOutcome
where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    F: FnMut(&str),
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return ReadOutcome::Cancelled,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => on_text(text.as_str()),
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.try_send(tungstenite::Message::Pong(data));
                    }
                    Some(Ok(tungstenite::Message::Pong(_))) => trace!("received pong"),
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(f) => (u16::from(f.code), f.reason.as_str().to_owned()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                        debug!(code, reason = %reason, "received close frame");
                        return ReadOutcome::Closed { code, reason, error: None };
                    }
                    Some(Ok(_)) => trace!("ignoring non-text frame"),
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        return ReadOutcome::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: e.to_string(),
                            error: Some(e),
                        };
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return ReadOutcome::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: String::new(),
                            error: None,
                        };
                    }
                }
            }
        }
    }
}
