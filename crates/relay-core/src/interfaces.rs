//! Abstract boundaries to the outside world (spec §6).
//!
//! `LeaderDetector` depends only on [`MarketDataSource`]; `TradeIngestor`
//! additionally depends on [`StreamSource`]; the execution worker depends on
//! [`Exchange`] and [`Notifier`]. None of these traits know about Postgres,
//! HTTP, or websockets — concrete adapters for those live in the crates that
//! implement ingestion and execution.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{LeaderTrade, Notification, OutcomeIndex, Side};
use crate::Result;

/// Opaque position in a per-wallet trade history, used to resume polling
/// without re-fetching trades already seen (mirrors the last-seen-block
/// cursor used by the wallet trade monitor this crate is modeled on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

/// Aggregate stats used to decide whether a wallet qualifies as a leader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletStats {
    pub total_volume: Decimal,
    pub total_trades: u64,
    pub win_rate: Option<f64>,
}

/// Read-only access to upstream wallet/trade data, used for both leader
/// discovery and the polling fallback path of trade ingestion.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Rolling stats for a single wallet, used by `LeaderDetector::discover`.
    async fn wallet_stats(&self, address: &str) -> Result<WalletStats>;

    /// Trades for `address` observed after `since` (or from the start of
    /// history when `None`), oldest first. Callers persist the returned
    /// cursor and pass it back on the next call.
    async fn recent_trades(&self, address: &str, since: Option<Cursor>) -> Result<(Vec<LeaderTrade>, Cursor)>;
}

/// A single message delivered over a streaming subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamFrame {
    Trade(LeaderTrade),
    /// Sent periodically so the ingestor can detect a silently-dead connection.
    Heartbeat,
}

/// Low-latency push feed of leader trades, preferred over polling when available.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open a subscription for the given leader addresses. The returned
    /// channel closes when the underlying connection drops; callers are
    /// expected to reconnect with backoff and fall back to polling after
    /// repeated failures.
    async fn subscribe(&self, addresses: &[String]) -> Result<mpsc::Receiver<StreamFrame>>;
}

/// An order submitted on behalf of a follower (spec §4.5 step 6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    /// `intent_id` encoded as a string, passed through so the exchange can
    /// de-duplicate retried submissions (spec §9 open question).
    pub idempotency_key: String,
    pub follower_address: String,
    pub market_id: String,
    pub outcome: OutcomeIndex,
    pub side: Side,
    pub limit_price: Decimal,
    pub shares: Decimal,
}

/// Exchange's acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeAck {
    pub exchange_order_ref: String,
    pub executed_price: Decimal,
    pub executed_shares: Decimal,
}

/// Abstract order-submission boundary implemented by the real exchange
/// client (and, in tests, by fakes with canned behavior).
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn submit(&self, order: ExchangeOrder) -> Result<ExchangeAck>;

    /// Current best price for `market_id`/`outcome`, used for the
    /// execution-time slippage check (spec §4.5 step 7).
    async fn current_price(&self, market_id: &str, outcome: OutcomeIndex) -> Result<Decimal>;
}

/// Sink for user-visible notifications about terminal intent outcomes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}
