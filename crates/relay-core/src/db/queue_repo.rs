//! Durable job queue backing the execution worker pool (spec §4.4).
//!
//! No dedicated job-queue crate appears anywhere in the stack this relay is
//! built on, so the queue is a plain table with `SELECT ... FOR UPDATE SKIP
//! LOCKED` reservation — the same durability guarantee a message broker would
//! give, without adding a new kind of infrastructure dependency.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::Result;

/// A job reserved by a worker: the intent to execute and how many times it
/// has already been attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueJob {
    pub intent_id: Uuid,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct QueueRepository {
    pool: PgPool,
}

impl QueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue an intent for execution no earlier than `available_at`.
    pub async fn enqueue(&self, intent_id: Uuid, available_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO copy_intent_queue (intent_id, available_at, locked_until, attempts, cancelled)
            VALUES ($1, $2, NULL, 0, FALSE)
            ON CONFLICT (intent_id) DO NOTHING
            "#,
        )
        .bind(intent_id)
        .bind(available_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reserve the oldest eligible job, locking it for `visibility_timeout_secs`.
    /// Returns `None` when nothing is ready — callers should back off and retry.
    pub async fn reserve(&self, visibility_timeout_secs: i64) -> Result<Option<QueueJob>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT intent_id, attempts
            FROM copy_intent_queue
            WHERE cancelled = FALSE
              AND available_at <= NOW()
              AND (locked_until IS NULL OR locked_until < NOW())
            ORDER BY available_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let intent_id: Uuid = row.get("intent_id");
        let attempts: i32 = row.get("attempts");
        let locked_until = Utc::now() + Duration::seconds(visibility_timeout_secs);

        sqlx::query("UPDATE copy_intent_queue SET locked_until = $2 WHERE intent_id = $1")
            .bind(intent_id)
            .bind(locked_until)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(QueueJob { intent_id, attempts: attempts as u32 }))
    }

    /// Remove a successfully (or terminally) processed job from the queue.
    pub async fn ack(&self, intent_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM copy_intent_queue WHERE intent_id = $1")
            .bind(intent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Release a job back for retry after `backoff_secs`, incrementing its attempt count.
    pub async fn nack(&self, intent_id: Uuid, backoff_secs: i64) -> Result<()> {
        let available_at = Utc::now() + Duration::seconds(backoff_secs);
        sqlx::query(
            r#"
            UPDATE copy_intent_queue
            SET available_at = $2, attempts = attempts + 1, locked_until = NULL
            WHERE intent_id = $1
            "#,
        )
        .bind(intent_id)
        .bind(available_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a queued job cancelled. A job already reserved by a worker still
    /// runs to completion — cancellation only prevents future reservation.
    pub async fn cancel(&self, intent_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE copy_intent_queue SET cancelled = TRUE WHERE intent_id = $1")
            .bind(intent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
