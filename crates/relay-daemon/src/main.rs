//! Copy-trade relay daemon entrypoint: wires leader detection, trade
//! ingestion, dispatch, and execution together and runs them until shutdown.

mod adapters;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use copy_dispatcher::Dispatcher;
use execution_worker::{Backoff, Executor, ExecutorConfig, WorkerPool};
use leader_detector::LeaderDetector;
use relay_core::db::{
    create_pool, run_migrations, CopiedTradeRepository, CopyIntentRepository, FollowRepository, LeaderRepository, NotificationRepository,
    QueueRepository,
};
use relay_core::types::LeaderThresholds;
use relay_core::Config;
use trade_ingestor::TradeIngestor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "relay_daemon=info,leader_detector=info,trade_ingestor=info,copy_dispatcher=info,execution_worker=info,relay_core=info,sqlx=warn,tungstenite=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting copy-trade relay daemon");

    let config = Config::from_env()?;
    let pool = create_pool(&config.database).await?;
    if std::env::var("SKIP_MIGRATIONS").is_err() {
        run_migrations(&pool).await?;
    }

    let notification_repo = NotificationRepository::new(pool.clone());
    let (market_source, stream_source, exchange, notifier) = adapters::build_adapters(&config, notification_repo);

    let leader_repo = LeaderRepository::new(pool.clone());
    let follow_repo = FollowRepository::new(pool.clone());
    let intent_repo = CopyIntentRepository::new(pool.clone());
    let copied_trade_repo = CopiedTradeRepository::new(pool.clone());
    let queue_repo = QueueRepository::new(pool.clone());

    let thresholds = LeaderThresholds {
        min_volume: config.detector.min_volume,
        min_trades: config.detector.min_trades,
        min_win_rate: config.detector.min_win_rate,
    };
    let detector = Arc::new(
        LeaderDetector::new(market_source.clone(), thresholds, config.detector.interval_secs).with_repository(leader_repo),
    );

    for leader in market_source_seed_leaders() {
        detector.add_candidate(&leader).await;
    }

    let (ingestor, trade_rx) = TradeIngestor::new(
        market_source.clone(),
        Some(stream_source.clone() as Arc<dyn relay_core::StreamSource>),
        config.ingestor.dedup_lru_size,
        config.ingestor.poll_interval_secs,
    );

    let dispatcher = Arc::new(Dispatcher::new(follow_repo.clone(), intent_repo.clone(), queue_repo.clone()));

    let executor = Arc::new(Executor::new(
        intent_repo,
        follow_repo,
        copied_trade_repo,
        queue_repo.clone(),
        exchange.clone() as Arc<dyn relay_core::Exchange>,
        notifier.clone() as Arc<dyn relay_core::Notifier>,
        ExecutorConfig {
            max_attempts: config.queue.max_attempts,
            backoff: Backoff { base_secs: config.queue.backoff_base_secs, cap_secs: config.queue.backoff_cap_secs },
        },
    ));

    let mut worker_pool = WorkerPool::new(queue_repo, executor, config.worker.concurrency, config.queue.visibility_timeout_secs as i64);
    worker_pool.start();

    let detector_handle = tokio::spawn({
        let detector = detector.clone();
        async move { detector.run().await }
    });

    let ingestor_handle = tokio::spawn({
        let ingestor = ingestor.clone();
        let leader_changes = detector.subscribe();
        async move { ingestor.run(leader_changes).await }
    });

    let dispatcher_handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run(trade_rx).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining in-flight work");

    detector_handle.abort();
    ingestor_handle.abort();
    dispatcher_handle.abort();
    worker_pool.shutdown().await;

    info!("shutdown complete");
    Ok(())
}

/// Operator-configured leader candidates. In a full deployment this would be
/// read from an admin API or a seed table; for now the daemon watches
/// whatever is already persisted plus this static seed list.
fn market_source_seed_leaders() -> Vec<String> {
    std::env::var("SEED_LEADER_ADDRESSES")
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}
