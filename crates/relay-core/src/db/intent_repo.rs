//! Database repository for copy intents.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::types::{CopyIntent, FailReason, IntentStatus, OutcomeIndex, Side, SkipReason};
use crate::Result;

#[derive(Clone)]
pub struct CopyIntentRepository {
    pool: PgPool,
}

impl CopyIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly-dispatched intent. A conflict on `intent_id` means a
    /// prior observation already produced this exact intent (I6) — treated as
    /// a no-op rather than an error so re-dispatch stays idempotent.
    pub async fn insert_pending(&self, intent: &CopyIntent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO copy_intent (
                intent_id, follow_id, leader_trade_id, follower_address, market_id,
                outcome, side, intended_notional, intended_price, status,
                skip_reason, fail_reason, created_at, scheduled_at, attempts
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (intent_id) DO NOTHING
            "#,
        )
        .bind(intent.intent_id)
        .bind(intent.follow_id)
        .bind(&intent.leader_trade_id)
        .bind(&intent.follower_address)
        .bind(&intent.market_id)
        .bind(outcome_str(intent.outcome))
        .bind(side_str(intent.side))
        .bind(intent.intended_notional)
        .bind(intent.intended_price)
        .bind(status_str(intent.status))
        .bind(intent.skip_reason.as_ref().map(serde_json::to_value).transpose()?)
        .bind(intent.fail_reason.as_ref().map(serde_json::to_value).transpose()?)
        .bind(intent.created_at)
        .bind(intent.scheduled_at)
        .bind(intent.attempts as i32)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(intent_id = %intent.intent_id, inserted, "Inserted copy intent");
        Ok(inserted)
    }

    pub async fn get(&self, intent_id: Uuid) -> Result<Option<CopyIntent>> {
        let row = sqlx::query(&format!("{} WHERE intent_id = $1", Self::SELECT_COLS))
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_intent(&r)).transpose()
    }

    pub async fn mark_skipped(&self, intent_id: Uuid, reason: &SkipReason) -> Result<()> {
        sqlx::query("UPDATE copy_intent SET status = 'skipped', skip_reason = $2 WHERE intent_id = $1")
            .bind(intent_id)
            .bind(serde_json::to_value(reason)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, intent_id: Uuid, reason: &FailReason, attempts: u32) -> Result<()> {
        sqlx::query(
            "UPDATE copy_intent SET status = 'failed', fail_reason = $2, attempts = $3 WHERE intent_id = $1",
        )
        .bind(intent_id)
        .bind(serde_json::to_value(reason)?)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, intent_id: Uuid, attempts: u32) -> Result<()> {
        sqlx::query("UPDATE copy_intent SET status = 'completed', attempts = $2 WHERE intent_id = $1")
            .bind(intent_id)
            .bind(attempts as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revert a claimed intent back to `Pending` for retry (nack path).
    pub async fn revert_to_pending(&self, intent_id: Uuid, attempts: u32) -> Result<()> {
        sqlx::query("UPDATE copy_intent SET status = 'pending', attempts = $2 WHERE intent_id = $1")
            .bind(intent_id)
            .bind(attempts as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically check the open-position (I4) and daily-loss (I5) risk gates
    /// for `intent_id` and, if both pass, transition it `Pending -> Processing`.
    /// Open positions are counted over `Processing` only (this candidate is
    /// still `Pending` and `Completed` is terminal), matching spec I4.
    ///
    /// Runs as a single `SERIALIZABLE` transaction so concurrent workers
    /// claiming intents for the same follower can't both observe a risk
    /// budget that's already spent by the other's in-flight claim.
    pub async fn risk_gate_and_claim(
        &self,
        intent_id: Uuid,
        follower_address: &str,
        max_daily_loss: Option<rust_decimal::Decimal>,
        max_open_positions: u32,
        day_start: DateTime<Utc>,
    ) -> Result<Result<(), SkipReason>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE").execute(&mut *tx).await?;

        // Lock the intent row for the duration of the risk check so a second
        // worker can't claim the same intent concurrently.
        sqlx::query("SELECT intent_id FROM copy_intent WHERE intent_id = $1 FOR UPDATE")
            .bind(intent_id)
            .fetch_one(&mut *tx)
            .await?;

        // Net notional outflow since UTC midnight: BUY admissions minus SELL
        // admissions (spec I5), not gross sum over both sides.
        let spent_row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(CASE WHEN side = 'buy' THEN intended_notional ELSE -intended_notional END), 0) AS total
            FROM copy_intent
            WHERE follower_address = $1 AND status IN ('processing', 'completed') AND created_at >= $2
            "#,
        )
        .bind(follower_address)
        .bind(day_start)
        .fetch_one(&mut *tx)
        .await?;
        let net_spent: rust_decimal::Decimal = spent_row.get("total");

        // Open positions are in-flight only (spec I4: PENDING+PROCESSING). The
        // candidate intent is still PENDING at this point and must not count
        // itself; COMPLETED is terminal and must not count either — a
        // follower who has ever finished `max_open_positions` copies would
        // otherwise never be able to copy again.
        let open_row = sqlx::query("SELECT COUNT(*) AS n FROM copy_intent WHERE follower_address = $1 AND status = 'processing'")
            .bind(follower_address)
            .fetch_one(&mut *tx)
            .await?;
        let open_positions: i64 = open_row.get("n");

        let intent_row = sqlx::query("SELECT intended_notional, side FROM copy_intent WHERE intent_id = $1")
            .bind(intent_id)
            .fetch_one(&mut *tx)
            .await?;
        let intended_notional: rust_decimal::Decimal = intent_row.get("intended_notional");
        let side = side_from_str(intent_row.get("side"))?;

        let outcome =
            crate::types::risk_gate_decision(net_spent, intended_notional, side, max_daily_loss, open_positions as u32, max_open_positions);

        match &outcome {
            Ok(()) => {
                sqlx::query("UPDATE copy_intent SET status = 'processing' WHERE intent_id = $1 AND status = 'pending'")
                    .bind(intent_id)
                    .execute(&mut *tx)
                    .await?;
            }
            Err(reason) => {
                sqlx::query("UPDATE copy_intent SET status = 'skipped', skip_reason = $2 WHERE intent_id = $1")
                    .bind(intent_id)
                    .bind(serde_json::to_value(reason)?)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    const SELECT_COLS: &'static str = r#"
        SELECT intent_id, follow_id, leader_trade_id, follower_address, market_id,
               outcome, side, intended_notional, intended_price, status,
               skip_reason, fail_reason, created_at, scheduled_at, attempts
        FROM copy_intent
    "#;

    fn row_to_intent(row: &sqlx::postgres::PgRow) -> Result<CopyIntent> {
        let skip_reason: Option<serde_json::Value> = row.get("skip_reason");
        let fail_reason: Option<serde_json::Value> = row.get("fail_reason");

        Ok(CopyIntent {
            intent_id: row.get("intent_id"),
            follow_id: row.get("follow_id"),
            leader_trade_id: row.get("leader_trade_id"),
            follower_address: row.get("follower_address"),
            market_id: row.get("market_id"),
            outcome: outcome_from_str(row.get("outcome"))?,
            side: side_from_str(row.get("side"))?,
            intended_notional: row.get("intended_notional"),
            intended_price: row.get("intended_price"),
            status: status_from_str(row.get("status"))?,
            skip_reason: skip_reason.map(serde_json::from_value).transpose()?,
            fail_reason: fail_reason.map(serde_json::from_value).transpose()?,
            created_at: row.get("created_at"),
            scheduled_at: row.get("scheduled_at"),
            attempts: row.get::<i32, _>("attempts") as u32,
        })
    }
}

fn outcome_str(o: OutcomeIndex) -> &'static str {
    match o {
        OutcomeIndex::Yes => "yes",
        OutcomeIndex::No => "no",
    }
}

fn outcome_from_str(s: &str) -> Result<OutcomeIndex> {
    match s {
        "yes" => Ok(OutcomeIndex::Yes),
        "no" => Ok(OutcomeIndex::No),
        other => Err(crate::Error::Internal(format!("unknown outcome '{other}' in copy_intent row"))),
    }
}

fn side_str(s: Side) -> &'static str {
    match s {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn side_from_str(s: &str) -> Result<Side> {
    match s {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        other => Err(crate::Error::Internal(format!("unknown side '{other}' in copy_intent row"))),
    }
}

fn status_str(s: IntentStatus) -> &'static str {
    match s {
        IntentStatus::Pending => "pending",
        IntentStatus::Processing => "processing",
        IntentStatus::Completed => "completed",
        IntentStatus::Failed => "failed",
        IntentStatus::Skipped => "skipped",
    }
}

fn status_from_str(s: &str) -> Result<IntentStatus> {
    match s {
        "pending" => Ok(IntentStatus::Pending),
        "processing" => Ok(IntentStatus::Processing),
        "completed" => Ok(IntentStatus::Completed),
        "failed" => Ok(IntentStatus::Failed),
        "skipped" => Ok(IntentStatus::Skipped),
        other => Err(crate::Error::Internal(format!("unknown status '{other}' in copy_intent row"))),
    }
}
