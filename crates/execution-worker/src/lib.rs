//! Durable queue consumption and order execution (spec §4.4, §4.5).

pub mod executor;
pub mod pool;
pub mod queue;

pub use executor::{slippage_pct, ExecutionMetrics, Executor, ExecutorConfig};
pub use pool::WorkerPool;
pub use queue::Backoff;
