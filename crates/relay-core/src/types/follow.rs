//! Follow relationships and the policies attached to them (spec §3).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trade::OutcomeIndex;

/// Per-follow copy policy (spec §3 `CopyPolicy`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyPolicy {
    /// Master switch for this edge, independent of the follower-wide
    /// `RiskPolicy::auto_copy_enabled` switch (spec §4.3 step 2a).
    pub enabled: bool,
    /// Fraction of the leader's notional to mirror, in `[0, 100]`.
    pub copy_percentage: Decimal,
    /// Whitelist of market ids; empty means no restriction (spec §4.3 step 2b).
    pub only_markets: Vec<String>,
    /// Blacklist of market ids; empty means no restriction (spec §4.3 step 2b).
    pub exclude_markets: Vec<String>,
    /// Subset of outcomes to copy; empty means both (spec §4.3 step 2c).
    pub only_outcomes: Vec<OutcomeIndex>,
}

/// Account-level risk controls enforced at dispatch and execution time
/// (spec §3 `RiskPolicy`, attached 1:1 to each follower).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Upper bound (%) on any single copy sizing, applied after `copy_percentage`.
    pub max_copy_percentage: Decimal,
    /// Below this notional, a sized intent is silently skipped.
    pub min_trade_amount: Decimal,
    /// Above this notional, a sized intent is capped rather than skipped. `None` means uncapped.
    pub max_trade_amount: Option<Decimal>,
    /// Ceiling on concurrently open (PENDING+PROCESSING) intents (I4).
    pub max_open_positions: u32,
    /// Ceiling on same-UTC-day net notional outflow. `None` disables the check (I5).
    pub max_daily_loss: Option<Decimal>,
    /// Maximum relative price drift tolerated between intended and live price, in `[0, 1]`.
    pub slippage_tolerance: f64,
    /// Scheduled lag from observing a leader trade to executing its copy.
    pub copy_delay_secs: u64,
    /// Master switch for the follower; checked afresh at execution time (spec §4.5 step 2).
    pub auto_copy_enabled: bool,
}

/// A follower's subscription to a leader's trades (spec §3 `Follow`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: Uuid,
    pub follower_address: String,
    pub leader_address: String,
    pub copy_policy: CopyPolicy,
    pub risk_policy: RiskPolicy,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    /// Whether `market_id` passes this follow's whitelist/blacklist (spec §4.3 step 2b).
    pub fn allows_market(&self, market_id: &str) -> bool {
        if !self.copy_policy.only_markets.is_empty() && !self.copy_policy.only_markets.iter().any(|m| m == market_id) {
            return false;
        }
        !self.copy_policy.exclude_markets.iter().any(|m| m == market_id)
    }

    /// Whether `outcome` passes this follow's outcome filter (spec §4.3 step 2c).
    pub fn allows_outcome(&self, outcome: OutcomeIndex) -> bool {
        self.copy_policy.only_outcomes.is_empty() || self.copy_policy.only_outcomes.contains(&outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn follow(only_markets: Vec<String>, exclude_markets: Vec<String>, only_outcomes: Vec<OutcomeIndex>) -> Follow {
        Follow {
            id: Uuid::new_v4(),
            follower_address: "0xfollower".into(),
            leader_address: "0xleader".into(),
            copy_policy: CopyPolicy {
                enabled: true,
                copy_percentage: Decimal::new(50, 0),
                only_markets,
                exclude_markets,
                only_outcomes,
            },
            risk_policy: RiskPolicy {
                max_copy_percentage: Decimal::new(100, 0),
                min_trade_amount: Decimal::new(1, 0),
                max_trade_amount: Some(Decimal::new(1000, 0)),
                max_open_positions: 10,
                max_daily_loss: Some(Decimal::new(5000, 0)),
                slippage_tolerance: 0.05,
                copy_delay_secs: 0,
                auto_copy_enabled: true,
            },
            enabled: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_filters_allows_any_market() {
        assert!(follow(vec![], vec![], vec![]).allows_market("market-1"));
    }

    #[test]
    fn whitelist_restricts_to_listed_markets() {
        let f = follow(vec!["market-1".to_string()], vec![], vec![]);
        assert!(f.allows_market("market-1"));
        assert!(!f.allows_market("market-2"));
    }

    #[test]
    fn blacklist_excludes_listed_markets() {
        let f = follow(vec![], vec!["market-1".to_string()], vec![]);
        assert!(!f.allows_market("market-1"));
        assert!(f.allows_market("market-2"));
    }

    #[test]
    fn no_outcome_filter_allows_both() {
        let f = follow(vec![], vec![], vec![]);
        assert!(f.allows_outcome(OutcomeIndex::Yes));
        assert!(f.allows_outcome(OutcomeIndex::No));
    }

    #[test]
    fn outcome_filter_restricts_to_listed_outcomes() {
        let f = follow(vec![], vec![], vec![OutcomeIndex::Yes]);
        assert!(f.allows_outcome(OutcomeIndex::Yes));
        assert!(!f.allows_outcome(OutcomeIndex::No));
    }
}
