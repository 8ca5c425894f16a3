//! Cross-component scenario tests for the copy-trade relay (spec §8 seed
//! scenarios). `Dispatcher`/`Executor` are built directly on `sqlx`-backed
//! repositories rather than trait objects, so a live Postgres is the only
//! way to exercise them end to end; these tests instead drive the same pure
//! decision functions the dispatcher and executor call internally
//! (`Follow::allows_market`/`allows_outcome`, `intended_notional`,
//! `risk_gate_decision`, `slippage_pct`) composed in the same order the
//! production code calls them, which is exactly what the teacher's own
//! `tests/integration_tests.rs` does for its risk and auth modules — no
//! test here touches a database.

use chrono::{Duration, Utc};
use copy_relay::core::types::{risk_gate_decision, CopyPolicy, Follow, LeaderTrade, OutcomeIndex, RiskPolicy, SkipReason, Side};
use copy_relay::dispatcher::intended_notional;
use copy_relay::worker::slippage_pct;
use rust_decimal::Decimal;
use uuid::Uuid;

fn follow(copy_percentage: Decimal, only_markets: Vec<String>, max_open_positions: u32) -> Follow {
    Follow {
        id: Uuid::new_v4(),
        follower_address: "0xfollower".into(),
        leader_address: "0xleader".into(),
        copy_policy: CopyPolicy {
            enabled: true,
            copy_percentage,
            only_markets,
            exclude_markets: vec![],
            only_outcomes: vec![],
        },
        risk_policy: RiskPolicy {
            max_copy_percentage: Decimal::new(100, 0),
            min_trade_amount: Decimal::new(1, 0),
            max_trade_amount: Some(Decimal::new(1000, 0)),
            max_open_positions,
            max_daily_loss: Some(Decimal::new(5000, 0)),
            slippage_tolerance: 0.05,
            copy_delay_secs: 0,
            auto_copy_enabled: true,
        },
        enabled: true,
        created_at: Utc::now(),
    }
}

fn leader_trade(market_id: &str, price: Decimal, notional: Decimal) -> LeaderTrade {
    LeaderTrade {
        leader_trade_id: "trade-1".into(),
        leader_address: "0xleader".into(),
        market_id: market_id.into(),
        outcome: OutcomeIndex::Yes,
        side: Side::Buy,
        price,
        quantity: notional / price,
        notional,
        observed_at: Utc::now(),
    }
}

/// Mirrors `Dispatcher::dispatch_to_follow`'s guard chain (spec §4.3 step 2),
/// returning `Err(reason)` the same way the dispatcher would write a
/// `Skipped` intent rather than enqueue one for execution.
fn run_dispatch_guard_chain(follow: &Follow, trade: &LeaderTrade) -> Result<Decimal, SkipReason> {
    if !follow.copy_policy.enabled || !follow.risk_policy.auto_copy_enabled {
        return Err(SkipReason::FollowDisabled);
    }
    if !follow.copy_policy.only_markets.is_empty() && !follow.copy_policy.only_markets.iter().any(|m| m == &trade.market_id) {
        return Err(SkipReason::MarketNotAllowed { market_id: trade.market_id.clone() });
    }
    if follow.copy_policy.exclude_markets.iter().any(|m| m == &trade.market_id) {
        return Err(SkipReason::MarketExcluded { market_id: trade.market_id.clone() });
    }
    if !follow.allows_outcome(trade.outcome) {
        return Err(SkipReason::OutcomeNotAllowed { outcome: trade.outcome });
    }
    let notional = intended_notional(follow, trade.notional);
    if notional < follow.risk_policy.min_trade_amount {
        return Err(SkipReason::BelowMinNotional { notional, min: follow.risk_policy.min_trade_amount });
    }
    Ok(notional)
}

#[test]
fn scenario_1_happy_path_proportional_copy() {
    let f = follow(Decimal::new(50, 0), vec![], 10);
    let trade = leader_trade("market-m", Decimal::new(65, 2), Decimal::new(100, 0));

    let notional = run_dispatch_guard_chain(&f, &trade).expect("should be admitted");
    assert_eq!(notional, Decimal::new(50, 0));

    let scheduled_at = trade.observed_at + Duration::seconds(f.risk_policy.copy_delay_secs as i64);
    assert_eq!(scheduled_at, trade.observed_at);

    let gate = risk_gate_decision(Decimal::ZERO, notional, Side::Buy, f.risk_policy.max_daily_loss, 0, f.risk_policy.max_open_positions);
    assert_eq!(gate, Ok(()));

    let live_price = Decimal::new(66, 2);
    let drift = slippage_pct(trade.price, live_price);
    assert!(drift < f.risk_policy.slippage_tolerance, "drift {drift} should clear 0.05 tolerance");

    let shares = notional / live_price;
    assert!((shares - Decimal::new(75758, 3)).abs() < Decimal::new(1, 2), "shares {shares} should be ~75.758");
}

#[test]
fn scenario_2_market_whitelist_skip() {
    let f = follow(Decimal::new(50, 0), vec!["market-other".to_string()], 10);
    let trade = leader_trade("market-m", Decimal::new(65, 2), Decimal::new(100, 0));

    let outcome = run_dispatch_guard_chain(&f, &trade);
    assert_eq!(outcome, Err(SkipReason::MarketNotAllowed { market_id: "market-m".to_string() }));
}

#[test]
fn scenario_3_slippage_reject() {
    let f = follow(Decimal::new(50, 0), vec![], 10);
    let trade = leader_trade("market-m", Decimal::new(65, 2), Decimal::new(100, 0));

    let notional = run_dispatch_guard_chain(&f, &trade).expect("should be admitted at dispatch time");

    let live_price = Decimal::new(80, 2);
    let drift = slippage_pct(trade.price, live_price);
    assert!(drift > f.risk_policy.slippage_tolerance, "drift {drift} should exceed 0.05 tolerance");
    assert!((drift - 0.2307).abs() < 0.001);

    // The executor never reaches `Exchange::submit` once slippage fails —
    // asserting the gate already passed (notional computed) but execution
    // stops before a share count / order is produced.
    assert_eq!(notional, Decimal::new(50, 0));
}

#[test]
fn scenario_4_position_cap_enforcement() {
    let f = follow(Decimal::new(50, 0), vec![], 2);
    let trade = leader_trade("market-m", Decimal::new(65, 2), Decimal::new(100, 0));
    let notional = run_dispatch_guard_chain(&f, &trade).expect("should be admitted at dispatch time");

    // Two existing PROCESSING intents already occupy both open-position slots.
    // `open_positions` here is the count `intent_repo::risk_gate_and_claim`'s
    // SQL actually feeds this function: PROCESSING only (spec I4 is
    // PENDING+PROCESSING, but the candidate itself is still PENDING at gate
    // time and never counts itself; COMPLETED is terminal and must not count
    // either — counting it would mean a follower who ever finished
    // `max_open_positions` copies could never copy again).
    let gate = risk_gate_decision(Decimal::ZERO, notional, Side::Buy, f.risk_policy.max_daily_loss, 2, f.risk_policy.max_open_positions);
    assert_eq!(gate, Err(SkipReason::PositionLimit { open: 2, max: 2 }));

    // One of the two completes: it drops out of the PROCESSING count (not
    // added to some separate completed bucket), freeing a slot — 1 remains
    // PROCESSING, so a subsequent trade is admitted.
    let gate_after_completion =
        risk_gate_decision(Decimal::ZERO, notional, Side::Buy, f.risk_policy.max_daily_loss, 1, f.risk_policy.max_open_positions);
    assert_eq!(gate_after_completion, Ok(()));
}

#[test]
fn scenario_5_duplicate_ingestion_is_idempotent() {
    let f = follow(Decimal::new(50, 0), vec![], 10);

    // Same leader_trade_id observed twice (once via stream, once via poll) —
    // intent_id is deterministic over (leader_trade_id, follow_id), so both
    // observations collapse onto the same id regardless of delivery order.
    let id_from_stream = copy_relay::core::intent_id("trade-X", f.id);
    let id_from_poll = copy_relay::core::intent_id("trade-X", f.id);
    assert_eq!(id_from_stream, id_from_poll);
}

#[test]
fn scenario_6_disable_during_delay() {
    let mut f = follow(Decimal::new(50, 0), vec![], 10);
    f.risk_policy.copy_delay_secs = 10;
    let trade = leader_trade("market-m", Decimal::new(65, 2), Decimal::new(100, 0));

    // At dispatch time (t+0) the follower is enabled, so the intent is
    // admitted and scheduled for t+10.
    let notional = run_dispatch_guard_chain(&f, &trade).expect("admitted while enabled");
    let scheduled_at = trade.observed_at + Duration::seconds(f.risk_policy.copy_delay_secs as i64);
    assert_eq!(scheduled_at, trade.observed_at + Duration::seconds(10));
    assert_eq!(notional, Decimal::new(50, 0));

    // At t+5s the follower disables auto-copy.
    f.risk_policy.auto_copy_enabled = false;

    // At t+10s the worker reserves the job and re-checks the follower state
    // (spec §4.5 step 2) before doing anything else — this re-check, not
    // the dispatch-time guard chain, is what catches the disable.
    let disabled_at_exec = !f.enabled || !f.risk_policy.auto_copy_enabled;
    assert!(disabled_at_exec);
}

#[test]
fn boundary_zero_copy_percentage_skips_below_min() {
    let f = follow(Decimal::ZERO, vec![], 10);
    let trade = leader_trade("market-m", Decimal::new(65, 2), Decimal::new(100, 0));

    let outcome = run_dispatch_guard_chain(&f, &trade);
    assert_eq!(outcome, Err(SkipReason::BelowMinNotional { notional: Decimal::ZERO, min: Decimal::new(1, 0) }));
}

#[test]
fn boundary_zero_slippage_tolerance_rejects_any_drift() {
    let mut f = follow(Decimal::new(50, 0), vec![], 10);
    f.risk_policy.slippage_tolerance = 0.0;

    assert!(slippage_pct(Decimal::new(65, 2), Decimal::new(6501, 4)) > f.risk_policy.slippage_tolerance);
    assert_eq!(slippage_pct(Decimal::new(65, 2), Decimal::new(65, 2)), f.risk_policy.slippage_tolerance);
}

#[test]
fn boundary_zero_max_open_positions_rejects_every_intent() {
    let gate = risk_gate_decision(Decimal::ZERO, Decimal::new(1, 0), Side::Buy, None, 0, 0);
    assert_eq!(gate, Err(SkipReason::PositionLimit { open: 0, max: 0 }));
}

#[test]
fn boundary_empty_market_filters_allow_all_markets() {
    let f = follow(Decimal::new(50, 0), vec![], 10);
    assert!(f.allows_market("any-market-at-all"));
}
