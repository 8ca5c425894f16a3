//! Copy intents: the dispatcher's unit of work (spec §3 `CopyIntent`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trade::{OutcomeIndex, Side};

/// Lifecycle state of a `CopyIntent` (spec §3 status machine).
///
/// `Pending -> Processing -> {Completed, Failed}`, or `Pending -> Skipped`
/// when the dispatcher's guard chain rejects the intent before it is ever
/// queued for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

/// Why the dispatcher skipped an intent before it reached the queue (spec §4.3).
///
/// These are carried as intent data rather than returned as `Err` — a skip is
/// an expected, user-visible outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    FollowDisabled,
    MarketNotAllowed { market_id: String },
    MarketExcluded { market_id: String },
    OutcomeNotAllowed { outcome: super::trade::OutcomeIndex },
    BelowMinNotional { notional: Decimal, min: Decimal },
    DuplicateObservation { leader_trade_id: String },
    /// Re-check at execution time found the follower disabled (spec §4.5 step 2).
    DisabledAtExec,
    PositionLimit { open: u32, max: u32 },
    DailyLossLimit { outflow: Decimal, max: Decimal },
    /// Recomputed notional exceeds `max_trade_amount` at execution time (spec §4.5 step 3).
    Oversize { notional: Decimal, max: Decimal },
}

/// Why an intent that reached `Processing` ended in `Failed` (spec §4.5, §7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailReason {
    SlippageRejected { intended_price: Decimal, live_price: Decimal, drift_pct: f64, max_pct: f64 },
    ExchangeRejected { detail: String },
    ExchangeTransient { detail: String },
    InternalError { detail: String },
}

/// One follower's copy of a single leader trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyIntent {
    /// Deterministic `hash(leader_trade_id, follow_id)` — the idempotency key (I6).
    pub intent_id: Uuid,
    pub follow_id: Uuid,
    pub leader_trade_id: String,
    pub follower_address: String,
    pub market_id: String,
    pub outcome: OutcomeIndex,
    pub side: Side,
    /// Notional computed by the dispatcher's sizing step, before any
    /// execution-time slippage adjustment.
    pub intended_notional: Decimal,
    pub intended_price: Decimal,
    pub status: IntentStatus,
    pub skip_reason: Option<SkipReason>,
    pub fail_reason: Option<FailReason>,
    pub created_at: DateTime<Utc>,
    /// Earliest time this intent becomes eligible for execution (copy delay applied).
    pub scheduled_at: DateTime<Utc>,
    pub attempts: u32,
}

impl SkipReason {
    /// Whether this terminal skip is user-visible (spec §7): position/loss
    /// caps and execution-time oversize are surfaced; the dispatcher's own
    /// filters and disables are silent, matching the leader trade that never
    /// should have reached the follower in the first place.
    pub fn notifies(&self) -> bool {
        matches!(self, SkipReason::PositionLimit { .. } | SkipReason::DailyLossLimit { .. } | SkipReason::Oversize { .. })
    }
}

impl CopyIntent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            IntentStatus::Completed | IntentStatus::Failed | IntentStatus::Skipped
        )
    }
}

/// Pure I4/I5 admission decision, isolated from the transaction that gathers
/// its inputs (`intent_repo::risk_gate_and_claim`) so the gating rule itself
/// is testable without a database.
///
/// `net_spent` is the follower's net notional outflow since the start of the
/// current UTC day — BUY admissions minus SELL admissions (spec I5), over
/// processing+completed intents. `intended_notional`/`side` are this
/// candidate's own signed contribution. `open_positions` is the follower's
/// current count of in-flight (processing-only) intents — spec I4 is
/// PENDING+PROCESSING, but the candidate itself is still PENDING at gate
/// time and must not count itself, and COMPLETED is terminal and must not
/// count either.
pub fn risk_gate_decision(
    net_spent: Decimal,
    intended_notional: Decimal,
    side: Side,
    max_daily_loss: Option<Decimal>,
    open_positions: u32,
    max_open_positions: u32,
) -> std::result::Result<(), SkipReason> {
    if let Some(max) = max_daily_loss {
        let delta = match side {
            Side::Buy => intended_notional,
            Side::Sell => -intended_notional,
        };
        let outflow = net_spent + delta;
        if outflow > max {
            return Err(SkipReason::DailyLossLimit { outflow, max });
        }
    }
    if open_positions >= max_open_positions {
        return Err(SkipReason::PositionLimit { open: open_positions, max: max_open_positions });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        let mut intent = CopyIntent {
            intent_id: Uuid::new_v4(),
            follow_id: Uuid::new_v4(),
            leader_trade_id: "t1".into(),
            follower_address: "0xfollower".into(),
            market_id: "market-1".into(),
            outcome: OutcomeIndex::Yes,
            side: Side::Buy,
            intended_notional: Decimal::new(50, 0),
            intended_price: Decimal::new(66, 2),
            status: IntentStatus::Pending,
            skip_reason: None,
            fail_reason: None,
            created_at: Utc::now(),
            scheduled_at: Utc::now(),
            attempts: 0,
        };
        assert!(!intent.is_terminal());
        intent.status = IntentStatus::Processing;
        assert!(!intent.is_terminal());
        intent.status = IntentStatus::Completed;
        assert!(intent.is_terminal());
    }

    #[test]
    fn risk_gate_admits_within_both_caps() {
        let decision = risk_gate_decision(Decimal::new(100, 0), Decimal::new(50, 0), Side::Buy, Some(Decimal::new(500, 0)), 1, 5);
        assert_eq!(decision, Ok(()));
    }

    #[test]
    fn risk_gate_rejects_daily_loss_overrun() {
        let decision = risk_gate_decision(Decimal::new(480, 0), Decimal::new(50, 0), Side::Buy, Some(Decimal::new(500, 0)), 1, 5);
        assert_eq!(
            decision,
            Err(SkipReason::DailyLossLimit { outflow: Decimal::new(530, 0), max: Decimal::new(500, 0) })
        );
    }

    #[test]
    fn risk_gate_rejects_position_limit() {
        let decision = risk_gate_decision(Decimal::ZERO, Decimal::new(10, 0), Side::Buy, None, 2, 2);
        assert_eq!(decision, Err(SkipReason::PositionLimit { open: 2, max: 2 }));
    }

    #[test]
    fn risk_gate_with_no_daily_loss_cap_only_checks_positions() {
        let decision = risk_gate_decision(Decimal::new(1_000_000, 0), Decimal::new(10, 0), Side::Buy, None, 0, 2);
        assert_eq!(decision, Ok(()));
    }

    #[test]
    fn risk_gate_zero_max_open_positions_rejects_every_new_intent() {
        let decision = risk_gate_decision(Decimal::ZERO, Decimal::new(1, 0), Side::Buy, None, 0, 0);
        assert_eq!(decision, Err(SkipReason::PositionLimit { open: 0, max: 0 }));
    }

    #[test]
    fn risk_gate_sell_reduces_net_outflow() {
        // A SELL nets against prior BUY outflow rather than adding to it.
        let decision = risk_gate_decision(Decimal::new(480, 0), Decimal::new(50, 0), Side::Sell, Some(Decimal::new(500, 0)), 1, 5);
        assert_eq!(decision, Ok(()));
    }
}
