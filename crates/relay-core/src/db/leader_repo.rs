//! Database repository for detected leaders.

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::types::Leader;
use crate::Result;

/// Repository for leader persistence.
pub struct LeaderRepository {
    pool: PgPool,
}

impl LeaderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a leader's rolling stats.
    pub async fn upsert(&self, leader: &Leader) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leader (address, total_volume, total_trades, win_rate, last_seen)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (address) DO UPDATE SET
                total_volume = EXCLUDED.total_volume,
                total_trades = EXCLUDED.total_trades,
                win_rate = EXCLUDED.win_rate,
                last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(&leader.address)
        .bind(leader.total_volume)
        .bind(leader.total_trades as i64)
        .bind(leader.win_rate)
        .bind(leader.last_seen)
        .execute(&self.pool)
        .await?;

        debug!(address = %leader.address, "Upserted leader");
        Ok(())
    }

    pub async fn get(&self, address: &str) -> Result<Option<Leader>> {
        let row = sqlx::query(
            "SELECT address, total_volume, total_trades, win_rate, last_seen FROM leader WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::row_to_leader(&r)))
    }

    pub async fn list(&self) -> Result<Vec<Leader>> {
        let rows = sqlx::query("SELECT address, total_volume, total_trades, win_rate, last_seen FROM leader")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(Self::row_to_leader).collect())
    }

    pub async fn delete(&self, address: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leader WHERE address = $1")
            .bind(address)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_leader(row: &sqlx::postgres::PgRow) -> Leader {
        Leader {
            address: row.get("address"),
            total_volume: row.get("total_volume"),
            total_trades: row.get::<i64, _>("total_trades") as u64,
            win_rate: row.get("win_rate"),
            last_seen: row.get("last_seen"),
        }
    }
}
