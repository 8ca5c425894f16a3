//! Database repository for follow relationships and their attached policies.

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::types::{CopyPolicy, Follow, OutcomeIndex, RiskPolicy};
use crate::{Error, Result};

#[derive(Clone)]
pub struct FollowRepository {
    pool: PgPool,
}

impl FollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, follow: &Follow) -> Result<()> {
        let only_markets = serde_json::to_value(&follow.copy_policy.only_markets)?;
        let exclude_markets = serde_json::to_value(&follow.copy_policy.exclude_markets)?;
        let only_outcomes = serde_json::to_value(
            follow.copy_policy.only_outcomes.iter().map(|o| outcome_str(*o)).collect::<Vec<_>>(),
        )?;

        sqlx::query(
            r#"
            INSERT INTO follow (
                id, follower_address, leader_address,
                copy_enabled, copy_percentage, only_markets, exclude_markets, only_outcomes,
                max_copy_percentage, min_trade_amount, max_trade_amount, max_open_positions,
                max_daily_loss, slippage_tolerance, copy_delay_secs, auto_copy_enabled,
                enabled, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(follow.id)
        .bind(&follow.follower_address)
        .bind(&follow.leader_address)
        .bind(follow.copy_policy.enabled)
        .bind(follow.copy_policy.copy_percentage)
        .bind(only_markets)
        .bind(exclude_markets)
        .bind(only_outcomes)
        .bind(follow.risk_policy.max_copy_percentage)
        .bind(follow.risk_policy.min_trade_amount)
        .bind(follow.risk_policy.max_trade_amount)
        .bind(follow.risk_policy.max_open_positions as i32)
        .bind(follow.risk_policy.max_daily_loss)
        .bind(follow.risk_policy.slippage_tolerance)
        .bind(follow.risk_policy.copy_delay_secs as i64)
        .bind(follow.risk_policy.auto_copy_enabled)
        .bind(follow.enabled)
        .bind(follow.created_at)
        .execute(&self.pool)
        .await?;

        debug!(follow_id = %follow.id, "Inserted follow");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Follow>> {
        let row = sqlx::query(&format!("{} WHERE id = $1", Self::SELECT_COLS)).bind(id).fetch_optional(&self.pool).await?;
        row.map(|r| Self::row_to_follow(&r)).transpose()
    }

    /// Enabled follows for a leader, used by the dispatcher's fan-out step (spec §4.3 step 1).
    pub async fn list_enabled_for_leader(&self, leader_address: &str) -> Result<Vec<Follow>> {
        let rows = sqlx::query(
            &format!("{} WHERE leader_address = $1 AND enabled = TRUE", Self::SELECT_COLS),
        )
        .bind(leader_address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_follow).collect()
    }

    pub async fn list_by_follower(&self, follower_address: &str) -> Result<Vec<Follow>> {
        let rows = sqlx::query(&format!("{} WHERE follower_address = $1", Self::SELECT_COLS))
            .bind(follower_address)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_follow).collect()
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE follow SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    const SELECT_COLS: &'static str = r#"
        SELECT id, follower_address, leader_address,
               copy_enabled, copy_percentage, only_markets, exclude_markets, only_outcomes,
               max_copy_percentage, min_trade_amount, max_trade_amount, max_open_positions,
               max_daily_loss, slippage_tolerance, copy_delay_secs, auto_copy_enabled,
               enabled, created_at
        FROM follow
    "#;

    fn row_to_follow(row: &sqlx::postgres::PgRow) -> Result<Follow> {
        let only_markets: serde_json::Value = row.get("only_markets");
        let only_markets: Vec<String> = serde_json::from_value(only_markets)?;
        let exclude_markets: serde_json::Value = row.get("exclude_markets");
        let exclude_markets: Vec<String> = serde_json::from_value(exclude_markets)?;
        let only_outcomes: serde_json::Value = row.get("only_outcomes");
        let only_outcomes: Vec<String> = serde_json::from_value(only_outcomes)?;
        let only_outcomes = only_outcomes.iter().map(|s| outcome_from_str(s)).collect::<Result<Vec<_>>>()?;

        Ok(Follow {
            id: row.get("id"),
            follower_address: row.get("follower_address"),
            leader_address: row.get("leader_address"),
            copy_policy: CopyPolicy {
                enabled: row.get("copy_enabled"),
                copy_percentage: row.get("copy_percentage"),
                only_markets,
                exclude_markets,
                only_outcomes,
            },
            risk_policy: RiskPolicy {
                max_copy_percentage: row.get("max_copy_percentage"),
                min_trade_amount: row.get("min_trade_amount"),
                max_trade_amount: row.get("max_trade_amount"),
                max_open_positions: row.get::<i32, _>("max_open_positions") as u32,
                max_daily_loss: row.get("max_daily_loss"),
                slippage_tolerance: row.get("slippage_tolerance"),
                copy_delay_secs: row.get::<i64, _>("copy_delay_secs") as u64,
                auto_copy_enabled: row.get("auto_copy_enabled"),
            },
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
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
        other => Err(Error::Internal(format!("unknown outcome '{other}' in follow.only_outcomes"))),
    }
}
