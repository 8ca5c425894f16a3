//! Database repository for confirmed copied-trade executions.

use sqlx::{PgPool, Row};

use crate::types::{CopiedTrade, OutcomeIndex, Side};
use crate::Result;

pub struct CopiedTradeRepository {
    pool: PgPool,
}

impl CopiedTradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, trade: &CopiedTrade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO copied_trade (
                id, intent_id, follower_address, market_id, outcome, side,
                executed_price, executed_shares, executed_notional, exchange_order_ref, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(trade.id)
        .bind(trade.intent_id)
        .bind(&trade.follower_address)
        .bind(&trade.market_id)
        .bind(outcome_str(trade.outcome))
        .bind(side_str(trade.side))
        .bind(trade.executed_price)
        .bind(trade.executed_shares)
        .bind(trade.executed_notional)
        .bind(&trade.exchange_order_ref)
        .bind(trade.executed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_by_follower(&self, follower_address: &str) -> Result<Vec<CopiedTrade>> {
        let rows = sqlx::query(
            r#"
            SELECT id, intent_id, follower_address, market_id, outcome, side,
                   executed_price, executed_shares, executed_notional, exchange_order_ref, executed_at
            FROM copied_trade
            WHERE follower_address = $1
            ORDER BY executed_at DESC
            "#,
        )
        .bind(follower_address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_trade).collect()
    }

    fn row_to_trade(row: &sqlx::postgres::PgRow) -> Result<CopiedTrade> {
        Ok(CopiedTrade {
            id: row.get("id"),
            intent_id: row.get("intent_id"),
            follower_address: row.get("follower_address"),
            market_id: row.get("market_id"),
            outcome: outcome_from_str(row.get("outcome"))?,
            side: side_from_str(row.get("side"))?,
            executed_price: row.get("executed_price"),
            executed_shares: row.get("executed_shares"),
            executed_notional: row.get("executed_notional"),
            exchange_order_ref: row.get("exchange_order_ref"),
            executed_at: row.get("executed_at"),
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
        other => Err(crate::Error::Internal(format!("unknown outcome '{other}' in copied_trade row"))),
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
        other => Err(crate::Error::Internal(format!("unknown side '{other}' in copied_trade row"))),
    }
}
