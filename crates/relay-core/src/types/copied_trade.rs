//! Confirmed executions against the exchange (spec §3 `CopiedTrade`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trade::{OutcomeIndex, Side};

/// A fill confirmed by the exchange for a completed `CopyIntent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopiedTrade {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub follower_address: String,
    pub market_id: String,
    pub outcome: OutcomeIndex,
    pub side: Side,
    pub executed_price: Decimal,
    pub executed_shares: Decimal,
    pub executed_notional: Decimal,
    pub exchange_order_ref: String,
    pub executed_at: DateTime<Utc>,
}
