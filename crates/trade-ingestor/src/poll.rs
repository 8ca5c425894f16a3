//! Polling ingestion path, used when streaming is unavailable or has been
//! abandoned after repeated reconnect failures (spec §4.2). Grounded on the
//! cursor-based wallet poll loop this crate is modeled on: track a per-leader
//! cursor so each tick only fetches trades not already seen.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use relay_core::interfaces::Cursor;
use relay_core::{types::LeaderTrade, MarketDataSource};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Poll a single leader on a fixed interval, forwarding newly-seen trades.
///
/// On a poll failure, a consecutive-failure counter applies the same
/// exponential backoff schedule as the streaming path (base 1s, factor 2,
/// cap 60s) to the next poll, on top of the normal interval (spec §4.2);
/// the counter resets on the next successful poll.
///
/// Runs until `trade_tx` is dropped (the ingestor is shutting down).
pub async fn run_polling(
    address: String,
    source: Arc<dyn MarketDataSource>,
    cursors: Arc<DashMap<String, Cursor>>,
    poll_interval_secs: u64,
    trade_tx: mpsc::Sender<LeaderTrade>,
) {
    let base_interval = Duration::from_secs(poll_interval_secs.max(1));
    let mut consecutive_failures: u32 = 0;

    loop {
        let extra_backoff = if consecutive_failures == 0 {
            Duration::ZERO
        } else {
            BACKOFF_BASE.saturating_mul(2u32.saturating_pow(consecutive_failures - 1)).min(BACKOFF_CAP)
        };
        sleep(base_interval + extra_backoff).await;

        let since = cursors.get(&address).map(|entry| entry.value().clone());
        match source.recent_trades(&address, since).await {
            Ok((trades, new_cursor)) => {
                debug!(address = %address, count = trades.len(), "polled trades");
                for trade in trades {
                    if trade_tx.send(trade).await.is_err() {
                        return;
                    }
                }
                cursors.insert(address.clone(), new_cursor);
                consecutive_failures = 0;
            }
            Err(err) if err.is_transient() => {
                consecutive_failures += 1;
                warn!(address = %address, error = %err, consecutive_failures, "poll cycle skipped, upstream unavailable");
            }
            Err(err) => {
                consecutive_failures += 1;
                warn!(address = %address, error = %err, consecutive_failures, "poll cycle failed");
            }
        }
    }
}
