//! Periodic leader discovery (spec §4.1).
//!
//! Mirrors the shape of the wallet trade monitor this crate is modeled on: a
//! shared `RwLock`-guarded set refreshed by a ticking background loop, with
//! subscribers notified of changes over a broadcast channel rather than
//! polling the set themselves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use relay_core::types::{Leader, LeaderThresholds};
use relay_core::{db::LeaderRepository, Error, MarketDataSource, Result};

/// A change to the detector's leader set, delivered to subscribers in the
/// order additions-before-removals within a single discovery cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaderChange {
    Added(Leader),
    Removed(String),
}

/// Discovers and tracks the set of wallets currently qualifying as leaders.
pub struct LeaderDetector {
    source: Arc<dyn MarketDataSource>,
    repo: Option<LeaderRepository>,
    thresholds: LeaderThresholds,
    /// Wallet addresses under consideration; fed by the operator or by an
    /// upstream discovery feed. Discovery only ever promotes or demotes
    /// addresses already in this pool.
    candidates: RwLock<HashSet<String>>,
    /// Cached leader set `L`, keyed by address.
    current: RwLock<HashMap<String, Leader>>,
    change_tx: broadcast::Sender<LeaderChange>,
    interval_secs: u64,
}

impl LeaderDetector {
    pub fn new(source: Arc<dyn MarketDataSource>, thresholds: LeaderThresholds, interval_secs: u64) -> Self {
        let (change_tx, _) = broadcast::channel(256);
        Self {
            source,
            repo: None,
            thresholds,
            candidates: RwLock::new(HashSet::new()),
            current: RwLock::new(HashMap::new()),
            change_tx,
            interval_secs,
        }
    }

    /// Persist discovered leaders to `repo` in addition to the in-memory set.
    pub fn with_repository(mut self, repo: LeaderRepository) -> Self {
        self.repo = Some(repo);
        self
    }

    pub async fn add_candidate(&self, address: &str) {
        self.candidates.write().await.insert(relay_core::types::normalize_address(address));
    }

    pub async fn remove_candidate(&self, address: &str) {
        let address = relay_core::types::normalize_address(address);
        self.candidates.write().await.remove(&address);
    }

    /// Subscribe to leader-set changes.
    pub fn subscribe(&self) -> broadcast::Receiver<LeaderChange> {
        self.change_tx.subscribe()
    }

    /// Whether `address` currently qualifies as a leader.
    pub async fn is_leader(&self, address: &str) -> bool {
        let address = relay_core::types::normalize_address(address);
        self.current.read().await.contains_key(&address)
    }

    pub async fn current_leaders(&self) -> Vec<Leader> {
        self.current.read().await.values().cloned().collect()
    }

    /// Run one discovery cycle: fetch stats for every candidate, and update
    /// the leader set from the ones that clear the configured thresholds.
    ///
    /// On a transient upstream error the whole cycle is abandoned and `L` is
    /// left untouched — a wallet dropping out of the leader set due to a
    /// flaky upstream would be worse than a stale-but-correct set.
    pub async fn discover(&self) -> Result<()> {
        let candidates: Vec<String> = self.candidates.read().await.iter().cloned().collect();

        let mut fresh = HashMap::new();
        for address in &candidates {
            let stats = match self.source.wallet_stats(address).await {
                Ok(stats) => stats,
                Err(err) if err.is_transient() => {
                    warn!(error = %err, "leader discovery cycle aborted: upstream unavailable");
                    return Ok(());
                }
                Err(Error::UpstreamBadData(detail)) => {
                    debug!(address, detail, "skipping candidate with malformed upstream data");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let leader = Leader {
                address: address.clone(),
                total_volume: stats.total_volume,
                total_trades: stats.total_trades,
                win_rate: stats.win_rate,
                last_seen: chrono::Utc::now(),
            };

            if leader.meets(&self.thresholds) {
                fresh.insert(address.clone(), leader);
            }
        }

        self.apply(fresh).await
    }

    async fn apply(&self, fresh: HashMap<String, Leader>) -> Result<()> {
        let mut current = self.current.write().await;

        let added: Vec<Leader> = fresh
            .iter()
            .filter(|(addr, _)| !current.contains_key(*addr))
            .map(|(_, leader)| leader.clone())
            .collect();
        let removed: Vec<String> = current
            .keys()
            .filter(|addr| !fresh.contains_key(*addr))
            .cloned()
            .collect();

        if let Some(repo) = &self.repo {
            for leader in &added {
                repo.upsert(leader).await?;
            }
            for address in &removed {
                repo.delete(address).await?;
            }
        }

        for leader in &added {
            info!(address = %leader.address, "wallet promoted to leader");
            let _ = self.change_tx.send(LeaderChange::Added(leader.clone()));
        }
        for address in &removed {
            info!(address = %address, "wallet demoted from leader");
            let _ = self.change_tx.send(LeaderChange::Removed(address.clone()));
        }

        *current = fresh;
        Ok(())
    }

    /// Run the discovery loop until the process is shut down.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        loop {
            ticker.tick().await;
            if let Err(err) = self.discover().await {
                warn!(error = %err, "leader discovery cycle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::{Cursor, WalletStats};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        volume: Decimal,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn wallet_stats(&self, _address: &str) -> Result<WalletStats> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WalletStats { total_volume: self.volume, total_trades: 50, win_rate: Some(0.6) })
        }

        async fn recent_trades(&self, _address: &str, _since: Option<Cursor>) -> Result<(Vec<relay_core::types::LeaderTrade>, Cursor)> {
            Ok((Vec::new(), Cursor("0".to_string())))
        }
    }

    fn thresholds() -> LeaderThresholds {
        LeaderThresholds { min_volume: Decimal::new(1000, 0), min_trades: 10, min_win_rate: 0.5 }
    }

    #[tokio::test]
    async fn candidate_above_threshold_is_promoted() {
        let source = Arc::new(FakeSource { volume: Decimal::new(5000, 0), calls: AtomicUsize::new(0) });
        let detector = LeaderDetector::new(source, thresholds(), 300);
        detector.add_candidate("0xABC").await;

        let mut rx = detector.subscribe();
        detector.discover().await.unwrap();

        assert!(detector.is_leader("0xabc").await);
        match rx.try_recv().unwrap() {
            LeaderChange::Added(leader) => assert_eq!(leader.address, "0xabc"),
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[tokio::test]
    async fn candidate_below_threshold_is_not_promoted() {
        let source = Arc::new(FakeSource { volume: Decimal::new(5, 0), calls: AtomicUsize::new(0) });
        let detector = LeaderDetector::new(source, thresholds(), 300);
        detector.add_candidate("0xdef").await;

        detector.discover().await.unwrap();
        assert!(!detector.is_leader("0xdef").await);
    }
}
