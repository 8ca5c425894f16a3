//! Fans out an observed leader trade into one `CopyIntent` per eligible
//! follow (spec §4.3). The per-follow guard chain below is grounded on
//! `CopyTradingMonitor::process_trade`'s sequential early-return checks
//! (disabled → market filter → sizing → scheduling), generalized to the
//! full whitelist/blacklist/outcome-filter/risk-cap chain spec §4.3 names.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use relay_core::db::{CopyIntentRepository, FollowRepository, QueueRepository};
use relay_core::types::{CopyIntent, Follow, IntentStatus, LeaderTrade, SkipReason};
use relay_core::Result;

/// Fans observed leader trades out to followers.
pub struct Dispatcher {
    follows: FollowRepository,
    intents: CopyIntentRepository,
    queue: QueueRepository,
}

impl Dispatcher {
    pub fn new(follows: FollowRepository, intents: CopyIntentRepository, queue: QueueRepository) -> Self {
        Self { follows, intents, queue }
    }

    /// Process one observed leader trade: load the leader's enabled follows
    /// and, for each, run the guard chain of spec §4.3 step 2 and enqueue a
    /// `CopyIntent` when it passes.
    ///
    /// Follows are processed one at a time in a fixed order (by id) so that,
    /// for a single follower with multiple follows of the same leader, intent
    /// creation order is deterministic.
    pub async fn on_leader_trade(&self, trade: &LeaderTrade) -> Result<()> {
        let mut follows = self.follows.list_enabled_for_leader(&trade.leader_address).await?;
        follows.sort_by_key(|f| f.id);

        for follow in &follows {
            // Spec §7: "each per-follow failure is localized to one intent
            // row" — a DB error on one follow must not abort the fan-out for
            // the rest (P4 requires exactly one CopyIntent per Follow, and
            // the leader trade itself is never persisted/retried).
            if let Err(err) = self.dispatch_to_follow(trade, follow).await {
                warn!(follow_id = %follow.id, error = %err, "failed to dispatch leader trade to follow, continuing with remaining follows");
            }
        }

        Ok(())
    }

    async fn dispatch_to_follow(&self, trade: &LeaderTrade, follow: &Follow) -> Result<()> {
        // step 2a: master switches. `Follow.enabled` is already filtered at
        // load time by `list_enabled_for_leader`; the policy- and
        // follower-level switches are checked here.
        if !follow.copy_policy.enabled || !follow.risk_policy.auto_copy_enabled {
            return self.skip(trade, follow, Decimal::ZERO, SkipReason::FollowDisabled).await;
        }

        // step 2b: market whitelist/blacklist.
        if !follow.copy_policy.only_markets.is_empty() && !follow.copy_policy.only_markets.iter().any(|m| m == &trade.market_id) {
            debug!(follow_id = %follow.id, market_id = %trade.market_id, "skipped: market not allowed");
            return self
                .skip(trade, follow, Decimal::ZERO, SkipReason::MarketNotAllowed { market_id: trade.market_id.clone() })
                .await;
        }
        if follow.copy_policy.exclude_markets.iter().any(|m| m == &trade.market_id) {
            debug!(follow_id = %follow.id, market_id = %trade.market_id, "skipped: market excluded");
            return self
                .skip(trade, follow, Decimal::ZERO, SkipReason::MarketExcluded { market_id: trade.market_id.clone() })
                .await;
        }

        // step 2c: outcome filter.
        if !follow.allows_outcome(trade.outcome) {
            debug!(follow_id = %follow.id, outcome = ?trade.outcome, "skipped: outcome not allowed");
            return self.skip(trade, follow, Decimal::ZERO, SkipReason::OutcomeNotAllowed { outcome: trade.outcome }).await;
        }

        // step 2d: sizing.
        let notional = intended_notional(follow, trade.notional);
        if notional < follow.risk_policy.min_trade_amount {
            return self
                .skip(
                    trade,
                    follow,
                    Decimal::ZERO,
                    SkipReason::BelowMinNotional { notional, min: follow.risk_policy.min_trade_amount },
                )
                .await;
        }

        // step 2e: scheduling — delay is measured from the leader trade's
        // observation time, not from dispatch wall-clock time, so replayed
        // or delayed dispatch doesn't push the schedule out further.
        let scheduled_at = trade.observed_at + Duration::seconds(follow.risk_policy.copy_delay_secs as i64);

        // step 2f: deterministic intent id, idempotent insert.
        let intent_id = relay_core::intent_id(&trade.leader_trade_id, follow.id);

        let intent = CopyIntent {
            intent_id,
            follow_id: follow.id,
            leader_trade_id: trade.leader_trade_id.clone(),
            follower_address: follow.follower_address.clone(),
            market_id: trade.market_id.clone(),
            outcome: trade.outcome,
            side: trade.side,
            intended_notional: notional,
            intended_price: trade.price,
            status: IntentStatus::Pending,
            skip_reason: None,
            fail_reason: None,
            created_at: Utc::now(),
            scheduled_at,
            attempts: 0,
        };

        let inserted = self.intents.insert_pending(&intent).await?;
        if !inserted {
            debug!(intent_id = %intent_id, "duplicate observation, intent already exists");
            return Ok(());
        }

        // step 2g: enqueue with delivery delay relative to now.
        let delay = (scheduled_at - Utc::now()).max(Duration::zero());
        self.queue.enqueue(intent_id, Utc::now() + delay).await?;
        info!(intent_id = %intent_id, follow_id = %follow.id, notional = %notional, "dispatched copy intent");
        Ok(())
    }

    async fn skip(&self, trade: &LeaderTrade, follow: &Follow, notional: Decimal, reason: SkipReason) -> Result<()> {
        let intent_id = relay_core::intent_id(&trade.leader_trade_id, follow.id);
        let intent = CopyIntent {
            intent_id,
            follow_id: follow.id,
            leader_trade_id: trade.leader_trade_id.clone(),
            follower_address: follow.follower_address.clone(),
            market_id: trade.market_id.clone(),
            outcome: trade.outcome,
            side: trade.side,
            intended_notional: notional,
            intended_price: trade.price,
            status: IntentStatus::Skipped,
            skip_reason: Some(reason),
            fail_reason: None,
            created_at: Utc::now(),
            scheduled_at: trade.observed_at,
            attempts: 0,
        };

        // Inserting an already-present intent_id is a no-op (I6).
        self.intents.insert_pending(&intent).await?;
        Ok(())
    }

    /// Drain `trades` and dispatch each in turn, used to wire the ingestor's
    /// output channel directly to the dispatcher.
    pub async fn run(self: Arc<Self>, mut trades: mpsc::Receiver<LeaderTrade>) {
        while let Some(trade) = trades.recv().await {
            if let Err(err) = self.on_leader_trade(&trade).await {
                warn!(error = %err, leader_trade_id = %trade.leader_trade_id, "dispatch failed");
            }
        }
    }
}

/// Compute the notional to copy for a single follow (spec §4.3 step 2d):
/// `copy_percentage` of the leader's notional, capped at `max_trade_amount`
/// if set, then re-capped at `max_copy_percentage` of the leader's notional.
pub fn intended_notional(follow: &Follow, leader_notional: Decimal) -> Decimal {
    let hundred = Decimal::new(100, 0);
    let base = leader_notional * follow.copy_policy.copy_percentage / hundred;

    let capped = match follow.risk_policy.max_trade_amount {
        Some(max) => base.min(max),
        None => base,
    };

    capped.min(leader_notional * follow.risk_policy.max_copy_percentage / hundred).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_core::types::{CopyPolicy, OutcomeIndex, RiskPolicy};
    use uuid::Uuid;

    fn follow(copy_percentage: Decimal, max_copy_percentage: Decimal, max_trade_amount: Option<Decimal>) -> Follow {
        Follow {
            id: Uuid::new_v4(),
            follower_address: "0xfollower".into(),
            leader_address: "0xleader".into(),
            copy_policy: CopyPolicy {
                enabled: true,
                copy_percentage,
                only_markets: vec![],
                exclude_markets: vec![],
                only_outcomes: vec![],
            },
            risk_policy: RiskPolicy {
                max_copy_percentage,
                min_trade_amount: Decimal::ZERO,
                max_trade_amount,
                max_open_positions: 10,
                max_daily_loss: Some(Decimal::new(5000, 0)),
                slippage_tolerance: 0.05,
                copy_delay_secs: 0,
                auto_copy_enabled: true,
            },
            enabled: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sizing_applies_copy_percentage() {
        let f = follow(Decimal::new(50, 0), Decimal::new(100, 0), None);
        assert_eq!(intended_notional(&f, Decimal::new(100, 0)), Decimal::new(50, 0));
    }

    #[test]
    fn sizing_is_capped_at_max_trade_amount() {
        let f = follow(Decimal::new(100, 0), Decimal::new(100, 0), Some(Decimal::new(30, 0)));
        assert_eq!(intended_notional(&f, Decimal::new(100, 0)), Decimal::new(30, 0));
    }

    #[test]
    fn sizing_is_capped_at_max_copy_percentage_of_leader_notional() {
        // copy_percentage alone would size to 80, but max_copy_percentage caps relative to leader notional at 40.
        let f = follow(Decimal::new(80, 0), Decimal::new(40, 0), None);
        assert_eq!(intended_notional(&f, Decimal::new(100, 0)), Decimal::new(40, 0));
    }

    #[test]
    fn zero_copy_percentage_sizes_to_zero() {
        let f = follow(Decimal::ZERO, Decimal::new(100, 0), None);
        assert_eq!(intended_notional(&f, Decimal::new(100, 0)), Decimal::ZERO);
    }

    #[test]
    fn allows_outcome_respects_only_outcomes_filter() {
        let mut f = follow(Decimal::new(50, 0), Decimal::new(100, 0), None);
        f.copy_policy.only_outcomes = vec![OutcomeIndex::Yes];
        assert!(f.allows_outcome(OutcomeIndex::Yes));
        assert!(!f.allows_outcome(OutcomeIndex::No));
    }
}
