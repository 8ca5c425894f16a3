//! Postgres connection pool and per-entity repositories (spec §6 persisted state).

mod copied_trade_repo;
mod follow_repo;
mod intent_repo;
mod leader_repo;
mod notification_repo;
mod queue_repo;

pub use copied_trade_repo::CopiedTradeRepository;
pub use follow_repo::FollowRepository;
pub use intent_repo::CopyIntentRepository;
pub use leader_repo::LeaderRepository;
pub use notification_repo::NotificationRepository;
pub use queue_repo::{QueueJob, QueueRepository};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;

use crate::config::DatabaseConfig;
use crate::Result;

/// Open a connection pool sized per configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Apply pending migrations from the workspace-level `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrator = sqlx::migrate::Migrator::new(Path::new("./migrations")).await?;
    migrator.run(pool).await?;
    Ok(())
}
