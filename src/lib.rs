//! Copy-trade relay: root crate providing benchmark and integration-test
//! access to the internal modules.
//!
//! For actual functionality, use the individual crates directly:
//!
//! - `relay-core`: domain types, persistence, config, error taxonomy
//! - `leader-detector`: periodic leader discovery
//! - `trade-ingestor`: streaming/polling leader trade ingestion
//! - `copy-dispatcher`: fan-out of observed trades into per-follower intents
//! - `execution-worker`: durable queue consumption and order execution
//! - `relay-daemon`: process entrypoint wiring the above together

// Re-export for benchmarks and the workspace-root integration tests.
pub use copy_dispatcher as dispatcher;
pub use execution_worker as worker;
pub use leader_detector as detector;
pub use relay_core as core;
