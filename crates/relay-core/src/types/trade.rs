//! Observed leader trades (spec §3 `LeaderTrade`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the market the leader traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// A binary outcome market's two sides, used to pick the right book/price leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeIndex {
    Yes,
    No,
}

/// A single fill observed on a tracked leader wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderTrade {
    /// Upstream-assigned identifier; part of the dedup/idempotency key (I6).
    pub leader_trade_id: String,
    pub leader_address: String,
    pub market_id: String,
    pub outcome: OutcomeIndex,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub notional: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl LeaderTrade {
    /// Notional recomputed from price × quantity, used to sanity-check upstream data.
    pub fn recomputed_notional(&self) -> Decimal {
        self.price * self.quantity
    }
}
