//! Shared domain types, error taxonomy, configuration, persistence, and
//! external-boundary traits for the copy-trade relay.

pub mod config;
pub mod db;
pub mod error;
pub mod idempotency;
pub mod interfaces;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use idempotency::intent_id;
pub use interfaces::{Cursor, Exchange, ExchangeAck, ExchangeOrder, MarketDataSource, Notifier, StreamFrame, StreamSource, WalletStats};
