//! Domain entities shared across the relay's crates (spec §3).

pub mod copied_trade;
pub mod follow;
pub mod intent;
pub mod notification;
pub mod trade;
pub mod wallet;

pub use copied_trade::CopiedTrade;
pub use follow::{CopyPolicy, Follow, RiskPolicy};
pub use intent::{risk_gate_decision, CopyIntent, FailReason, IntentStatus, SkipReason};
pub use notification::{Notification, NotificationKind};
pub use trade::{LeaderTrade, OutcomeIndex, Side};
pub use wallet::{normalize_address, Leader, LeaderThresholds};
