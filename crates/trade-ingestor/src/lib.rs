//! Dual-mode ingestion of leader trades: streaming when available, polling
//! as a fallback, with a process-local dedup filter in front of the output
//! channel handed to the dispatcher (spec §4.2).

mod dedup;
mod poll;
mod stream;

pub use dedup::Dedup;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use leader_detector::LeaderChange;
use relay_core::interfaces::Cursor;
use relay_core::types::LeaderTrade;
use relay_core::{MarketDataSource, StreamSource};

/// Ingests observed leader trades and forwards deduplicated ones downstream.
pub struct TradeIngestor {
    market_source: Arc<dyn MarketDataSource>,
    stream_source: Option<Arc<dyn StreamSource>>,
    dedup: Arc<Dedup>,
    cursors: Arc<DashMap<String, Cursor>>,
    poll_interval_secs: u64,
    tasks: DashMap<String, JoinHandle<()>>,
    internal_tx: mpsc::Sender<LeaderTrade>,
}

impl TradeIngestor {
    /// Construct an ingestor. Returns the instance and the output channel the
    /// dispatcher should read deduplicated trades from.
    pub fn new(
        market_source: Arc<dyn MarketDataSource>,
        stream_source: Option<Arc<dyn StreamSource>>,
        dedup_capacity: usize,
        poll_interval_secs: u64,
    ) -> (Arc<Self>, mpsc::Receiver<LeaderTrade>) {
        let (internal_tx, internal_rx) = mpsc::channel(1024);
        let (out_tx, out_rx) = mpsc::channel(1024);

        let ingestor = Arc::new(Self {
            market_source,
            stream_source,
            dedup: Arc::new(Dedup::new(dedup_capacity)),
            cursors: Arc::new(DashMap::new()),
            poll_interval_secs,
            tasks: DashMap::new(),
            internal_tx,
        });

        tokio::spawn(dedup_filter(ingestor.dedup.clone(), internal_rx, out_tx));

        (ingestor, out_rx)
    }

    /// Begin tracking a leader address directly, without waiting for a
    /// `LeaderChange` event. Useful for tests and for seeding the ingestor
    /// before the detector's first discovery cycle completes.
    pub fn track(self: &Arc<Self>, address: &str) {
        let address = relay_core::types::normalize_address(address);
        if self.tasks.contains_key(&address) {
            return;
        }

        let handle = self.clone().spawn_leader(address.clone());
        self.tasks.insert(address, handle);
    }

    pub fn untrack(&self, address: &str) {
        let address = relay_core::types::normalize_address(address);
        if let Some((_, handle)) = self.tasks.remove(&address) {
            handle.abort();
        }
    }

    fn spawn_leader(self: Arc<Self>, address: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Some(stream_source) = self.stream_source.clone() {
                let outcome = stream::run_streaming(address.clone(), stream_source, self.internal_tx.clone()).await;
                if matches!(outcome, stream::StreamOutcome::Disconnected) {
                    return;
                }
                info!(address = %address, "switching to polling for this leader");
            }

            poll::run_polling(
                address,
                self.market_source.clone(),
                self.cursors.clone(),
                self.poll_interval_secs,
                self.internal_tx.clone(),
            )
            .await;
        })
    }

    /// React to leader-set changes from the detector: start ingesting newly
    /// promoted leaders, stop ingesting demoted ones.
    pub async fn run(self: Arc<Self>, mut leader_changes: broadcast::Receiver<LeaderChange>) {
        loop {
            match leader_changes.recv().await {
                Ok(LeaderChange::Added(leader)) => self.track(&leader.address),
                Ok(LeaderChange::Removed(address)) => self.untrack(&address),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "leader change stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

async fn dedup_filter(dedup: Arc<Dedup>, mut rx: mpsc::Receiver<LeaderTrade>, tx: mpsc::Sender<LeaderTrade>) {
    while let Some(trade) = rx.recv().await {
        if dedup.check_and_insert(&trade.leader_trade_id) {
            tracing::debug!(leader_trade_id = %trade.leader_trade_id, "dropped duplicate observation");
            continue;
        }
        if tx.send(trade).await.is_err() {
            return;
        }
    }
}
