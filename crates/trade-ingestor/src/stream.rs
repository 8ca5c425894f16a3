//! Streaming ingestion path, preferred over polling when the upstream
//! supports it (spec §4.2). Grounded on the reconnecting websocket loop used
//! for orderbook subscriptions: connect, read frames until the socket drops,
//! reconnect with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use relay_core::interfaces::StreamFrame;
use relay_core::StreamSource;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Outcome of a streaming attempt for one leader address.
pub enum StreamOutcome {
    /// The connection closed normally or the subscriber was dropped; caller
    /// may retry.
    Disconnected,
    /// Reconnection attempts were exhausted; caller should fall back to polling.
    GiveUp,
}

/// Run the streaming subscription for a single leader, forwarding trades on
/// `trade_tx`, until reconnection attempts are exhausted.
///
/// Returns once streaming should no longer be attempted for this leader
/// (caller falls back to the polling path).
pub async fn run_streaming(
    address: String,
    source: Arc<dyn StreamSource>,
    trade_tx: mpsc::Sender<relay_core::types::LeaderTrade>,
) -> StreamOutcome {
    let mut attempt: u32 = 0;

    loop {
        match source.subscribe(std::slice::from_ref(&address)).await {
            Ok(mut rx) => {
                attempt = 0;
                info!(address = %address, "streaming subscription established");

                while let Some(frame) = rx.recv().await {
                    match frame {
                        StreamFrame::Trade(trade) => {
                            if trade_tx.send(trade).await.is_err() {
                                debug!(address = %address, "ingestor channel closed, stopping stream");
                                return StreamOutcome::Disconnected;
                            }
                        }
                        StreamFrame::Heartbeat => {
                            debug!(address = %address, "stream heartbeat");
                        }
                    }
                }

                warn!(address = %address, "streaming subscription closed, reconnecting");
            }
            Err(err) => {
                warn!(address = %address, error = %err, attempt, "streaming subscribe failed");
            }
        }

        attempt += 1;
        if attempt > MAX_RECONNECT_ATTEMPTS {
            warn!(address = %address, "exhausted reconnect attempts, falling back to polling");
            return StreamOutcome::GiveUp;
        }

        let backoff = BACKOFF_BASE.saturating_mul(2u32.saturating_pow(attempt - 1)).min(BACKOFF_CAP);
        sleep(backoff).await;
    }
}
