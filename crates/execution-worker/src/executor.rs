//! Per-intent execution: risk gate, slippage check, exchange submission
//! (spec §4.5). Grounded on the market-order executor this crate is modeled
//! on — same latency-tracked metrics under a `std::sync::RwLock`, same
//! success/reject/transient classification of the exchange response.

use std::sync::RwLock;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use relay_core::db::{CopiedTradeRepository, CopyIntentRepository, FollowRepository, QueueRepository};
use relay_core::interfaces::{Exchange, ExchangeOrder, Notifier};
use relay_core::types::{CopiedTrade, FailReason, Notification, NotificationKind};
use relay_core::{Error, Result};

use crate::queue::Backoff;

/// Running counters for observability, snapshotted by `metrics()`.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub avg_latency_us: u64,
}

impl Clone for ExecutionMetrics {
    fn clone(&self) -> Self {
        Self {
            submitted: self.submitted,
            completed: self.completed,
            failed: self.failed,
            skipped: self.skipped,
            avg_latency_us: self.avg_latency_us,
        }
    }
}

pub struct ExecutorConfig {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Executes a single reserved `CopyIntent` through to a terminal outcome.
pub struct Executor {
    intents: CopyIntentRepository,
    follows: FollowRepository,
    copied_trades: CopiedTradeRepository,
    queue: QueueRepository,
    exchange: std::sync::Arc<dyn Exchange>,
    notifier: std::sync::Arc<dyn Notifier>,
    config: ExecutorConfig,
    metrics: RwLock<ExecutionMetrics>,
}

impl Executor {
    pub fn new(
        intents: CopyIntentRepository,
        follows: FollowRepository,
        copied_trades: CopiedTradeRepository,
        queue: QueueRepository,
        exchange: std::sync::Arc<dyn Exchange>,
        notifier: std::sync::Arc<dyn Notifier>,
        config: ExecutorConfig,
    ) -> Self {
        Self { intents, follows, copied_trades, queue, exchange, notifier, config, metrics: RwLock::new(ExecutionMetrics::default()) }
    }

    pub fn metrics(&self) -> ExecutionMetrics {
        self.metrics.read().unwrap().clone()
    }

    /// Drive `intent_id` (already reserved from the queue) through to a
    /// terminal status: completed, failed, or skipped. Never leaves an
    /// intent claimed-but-unresolved in the queue — the queue entry is
    /// always acked or nacked before returning.
    pub async fn process(&self, intent_id: Uuid, reservation_attempts: u32) -> Result<()> {
        let started = Instant::now();

        let Some(intent) = self.intents.get(intent_id).await? else {
            warn!(intent_id = %intent_id, "reserved intent has no row, acking stale queue entry");
            self.queue.ack(intent_id).await?;
            return Ok(());
        };

        if intent.is_terminal() {
            // Already resolved by a previous delivery of this job (at-least-once
            // redelivery after a worker crashed before acking).
            self.queue.ack(intent_id).await?;
            return Ok(());
        }

        let Some(follow) = self.follows.get(intent.follow_id).await? else {
            self.finish_skipped(intent_id, relay_core::types::SkipReason::DisabledAtExec, &intent.follower_address).await?;
            return Ok(());
        };

        // step 2: refresh follower state. `Follow.enabled` may have been
        // revoked since dispatch; `auto_copy_enabled` is the follower-wide
        // switch spec §4.5 step 2 asks to re-check afresh.
        if !follow.enabled || !follow.risk_policy.auto_copy_enabled {
            self.finish_skipped(intent_id, relay_core::types::SkipReason::DisabledAtExec, &intent.follower_address).await?;
            return Ok(());
        }

        // step 3c (recheck): policy may have changed `max_trade_amount` since dispatch.
        if let Some(max_trade_amount) = follow.risk_policy.max_trade_amount {
            if intent.intended_notional > max_trade_amount {
                self.finish_skipped(
                    intent_id,
                    relay_core::types::SkipReason::Oversize { notional: intent.intended_notional, max: max_trade_amount },
                    &intent.follower_address,
                )
                .await?;
                return Ok(());
            }
        }

        let day_start = Utc::now().date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        let gate = self
            .intents
            .risk_gate_and_claim(
                intent_id,
                &intent.follower_address,
                follow.risk_policy.max_daily_loss,
                follow.risk_policy.max_open_positions,
                day_start,
            )
            .await?;

        let reason = match gate {
            Ok(()) => None,
            Err(reason) => Some(reason),
        };
        if let Some(reason) = reason {
            self.finish_skipped(intent_id, reason, &intent.follower_address).await?;
            return Ok(());
        }

        let live_price = self.exchange.current_price(&intent.market_id, intent.outcome).await?;
        let drift_pct = slippage_pct(intent.intended_price, live_price);

        if drift_pct > follow.risk_policy.slippage_tolerance {
            let fail_reason = FailReason::SlippageRejected {
                intended_price: intent.intended_price,
                live_price,
                drift_pct,
                max_pct: follow.risk_policy.slippage_tolerance,
            };
            self.finish_failed(intent_id, fail_reason, reservation_attempts, &intent.follower_address).await?;
            return Ok(());
        }

        let shares = if live_price.is_zero() { Decimal::ZERO } else { intent.intended_notional / live_price };

        let order = ExchangeOrder {
            idempotency_key: intent_id.to_string(),
            follower_address: intent.follower_address.clone(),
            market_id: intent.market_id.clone(),
            outcome: intent.outcome,
            side: intent.side,
            limit_price: live_price,
            shares,
        };

        {
            let mut metrics = self.metrics.write().unwrap();
            metrics.submitted += 1;
        }

        match self.exchange.submit(order).await {
            Ok(ack) => {
                let trade = CopiedTrade {
                    id: Uuid::new_v4(),
                    intent_id,
                    follower_address: intent.follower_address.clone(),
                    market_id: intent.market_id.clone(),
                    outcome: intent.outcome,
                    side: intent.side,
                    executed_price: ack.executed_price,
                    executed_shares: ack.executed_shares,
                    executed_notional: ack.executed_price * ack.executed_shares,
                    exchange_order_ref: ack.exchange_order_ref,
                    executed_at: Utc::now(),
                };
                self.copied_trades.insert(&trade).await?;
                self.intents.mark_completed(intent_id, reservation_attempts).await?;
                self.queue.ack(intent_id).await?;

                self.record_latency(started);
                {
                    let mut metrics = self.metrics.write().unwrap();
                    metrics.completed += 1;
                }

                info!(intent_id = %intent_id, executed_notional = %trade.executed_notional, "copy intent completed");
                self.notify(&intent.follower_address, intent_id, NotificationKind::Copied {
                    executed_notional: trade.executed_notional.to_string(),
                })
                .await;
            }
            Err(Error::ExchangeRejected(detail)) => {
                self.finish_failed(
                    intent_id,
                    FailReason::ExchangeRejected { detail },
                    reservation_attempts,
                    &intent.follower_address,
                )
                .await?;
            }
            Err(err) if err.is_transient() => {
                let next_attempts = reservation_attempts + 1;
                if next_attempts >= self.config.max_attempts {
                    self.finish_failed(
                        intent_id,
                        FailReason::ExchangeTransient { detail: err.to_string() },
                        next_attempts,
                        &intent.follower_address,
                    )
                    .await?;
                } else {
                    self.intents.revert_to_pending(intent_id, next_attempts).await?;
                    self.queue.nack(intent_id, self.config.backoff.delay_secs(next_attempts)).await?;
                    warn!(intent_id = %intent_id, attempt = next_attempts, error = %err, "exchange call failed transiently, retrying");
                }
            }
            Err(err) => {
                self.finish_failed(
                    intent_id,
                    FailReason::InternalError { detail: err.to_string() },
                    reservation_attempts,
                    &intent.follower_address,
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn finish_skipped(&self, intent_id: Uuid, reason: relay_core::types::SkipReason, follower_address: &str) -> Result<()> {
        self.intents.mark_skipped(intent_id, &reason).await?;
        self.queue.ack(intent_id).await?;
        {
            let mut metrics = self.metrics.write().unwrap();
            metrics.skipped += 1;
        }
        // Spec §7: position_limit/daily_loss_limit/oversize notify; disabled
        // and disabled_at_exec are silent skips.
        if reason.notifies() {
            let reason_text = format!("{reason:?}");
            self.notify(follower_address, intent_id, NotificationKind::Skipped { reason: reason_text }).await;
        }
        Ok(())
    }

    async fn finish_failed(&self, intent_id: Uuid, reason: FailReason, attempts: u32, follower_address: &str) -> Result<()> {
        self.intents.mark_failed(intent_id, &reason, attempts).await?;
        self.queue.ack(intent_id).await?;
        {
            let mut metrics = self.metrics.write().unwrap();
            metrics.failed += 1;
        }
        let reason_text = format!("{reason:?}");
        self.notify(follower_address, intent_id, NotificationKind::Failed { reason: reason_text }).await;
        Ok(())
    }

    async fn notify(&self, follower_address: &str, intent_id: Uuid, kind: NotificationKind) {
        let notification = Notification {
            id: Uuid::new_v4(),
            follower_address: follower_address.to_string(),
            intent_id,
            kind,
            created_at: Utc::now(),
        };
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(intent_id = %intent_id, error = %err, "failed to deliver notification");
        }
    }

    fn record_latency(&self, started: Instant) {
        let elapsed_us = started.elapsed().as_micros() as u64;
        let mut metrics = self.metrics.write().unwrap();
        metrics.avg_latency_us = if metrics.completed == 0 {
            elapsed_us
        } else {
            (metrics.avg_latency_us * metrics.completed + elapsed_us) / (metrics.completed + 1)
        };
    }
}

/// Percentage drift between the intent's sizing price and the live price
/// (spec §4.5 step 7, P6).
pub fn slippage_pct(intended: Decimal, live: Decimal) -> f64 {
    if intended.is_zero() {
        return 0.0;
    }
    let drift = ((live - intended) / intended).abs();
    drift.to_f64().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slippage_is_zero_for_matching_prices() {
        assert_eq!(slippage_pct(Decimal::new(66, 2), Decimal::new(66, 2)), 0.0);
    }

    #[test]
    fn slippage_reflects_relative_drift() {
        let pct = slippage_pct(Decimal::new(50, 0), Decimal::new(505, 1));
        assert!((pct - 0.01).abs() < 1e-9);
    }
}
