//! Keepalive pump: periodic outbound `ping` envelopes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use companion_protocol::envelope::Envelope;

/// Shortest period the pump will tick at; a zero period is raised to this.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Sends a `ping` envelope every `period` until cancelled or the write
/// queue closes. The first ping goes out one full period after start.
pub(crate) async fn keepalive_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let json = match Envelope::ping().to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("failed to encode keepalive: {e}");
                        continue;
                    }
                };
                trace!("sending keepalive");
                if write_tx.send(tungstenite::Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}
