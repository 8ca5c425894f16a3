//! Wallet and leader types (spec §3).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalize a wallet address to its canonical (lower-case) form.
///
/// Every lookup in the relay keys on this form, mirroring the
/// `to_lowercase()` convention used throughout wallet tracking.
pub fn normalize_address(address: &str) -> String {
    address.to_lowercase()
}

/// Rolling stats that qualify a wallet as a `Leader` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub address: String,
    pub total_volume: Decimal,
    pub total_trades: u64,
    /// `None` when the upstream doesn't expose closed-position ratio; admission
    /// then proceeds on volume + trade count alone (spec §4.1).
    pub win_rate: Option<f64>,
    pub last_seen: DateTime<Utc>,
}

/// Thresholds a wallet must clear to be considered a `Leader`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderThresholds {
    pub min_volume: Decimal,
    pub min_trades: u64,
    pub min_win_rate: f64,
}

impl Leader {
    /// Whether this wallet's stats clear the given thresholds.
    ///
    /// A missing (unknown) win rate never blocks admission — spec §4.1 says to
    /// "admit on volume+trades alone" when win rate can't be estimated.
    pub fn meets(&self, thresholds: &LeaderThresholds) -> bool {
        self.total_volume >= thresholds.min_volume
            && self.total_trades >= thresholds.min_trades
            && self.win_rate.map(|wr| wr >= thresholds.min_win_rate).unwrap_or(true)
    }
}
