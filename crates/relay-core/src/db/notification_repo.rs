//! Database repository for follower-facing notifications.

use sqlx::{PgPool, Row};

use crate::types::{Notification, NotificationKind};
use crate::Result;

pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification (id, follower_address, intent_id, kind, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.follower_address)
        .bind(notification.intent_id)
        .bind(serde_json::to_value(&notification.kind)?)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_follower(&self, follower_address: &str, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, follower_address, intent_id, kind, created_at
            FROM notification
            WHERE follower_address = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(follower_address)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: serde_json::Value = row.get("kind");
                Ok(Notification {
                    id: row.get("id"),
                    follower_address: row.get("follower_address"),
                    intent_id: row.get("intent_id"),
                    kind: serde_json::from_value::<NotificationKind>(kind)?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}
