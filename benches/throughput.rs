//! Throughput benchmarks for batch dispatch-decision workloads.
//!
//! Run with: `cargo bench --bench throughput`

use chrono::Utc;
use copy_relay::core::types::{CopyPolicy, Follow, LeaderTrade, OutcomeIndex, RiskPolicy, Side};
use copy_relay::dispatcher::intended_notional;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use uuid::Uuid;

fn follow_fixture(copy_percentage: Decimal) -> Follow {
    Follow {
        id: Uuid::new_v4(),
        follower_address: "0xfollower".into(),
        leader_address: "0xleader".into(),
        copy_policy: CopyPolicy {
            enabled: true,
            copy_percentage,
            only_markets: vec![],
            exclude_markets: vec!["market-excluded".to_string()],
            only_outcomes: vec![],
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

fn trade_fixture(market_id: &str) -> LeaderTrade {
    LeaderTrade {
        leader_trade_id: Uuid::new_v4().to_string(),
        leader_address: "0xleader".into(),
        market_id: market_id.to_string(),
        outcome: OutcomeIndex::Yes,
        side: Side::Buy,
        price: Decimal::new(65, 2),
        quantity: Decimal::new(100, 0),
        notional: Decimal::new(65, 0),
        observed_at: Utc::now(),
    }
}

/// Runs the pure portion of the dispatcher's per-follow guard chain (market
/// filter, outcome filter, sizing) over `n` follows for one leader trade —
/// the CPU-bound work `Dispatcher::dispatch_to_follow` does before touching
/// the database.
fn run_guard_chain(follows: &[Follow], trade: &LeaderTrade) -> usize {
    let mut admitted = 0;
    for follow in follows {
        if !follow.copy_policy.enabled || !follow.risk_policy.auto_copy_enabled {
            continue;
        }
        if !follow.allows_market(&trade.market_id) {
            continue;
        }
        if !follow.allows_outcome(trade.outcome) {
            continue;
        }
        let notional = intended_notional(follow, trade.notional);
        if notional < follow.risk_policy.min_trade_amount {
            continue;
        }
        admitted += 1;
    }
    admitted
}

fn bench_guard_chain_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_guard_chain_fanout");
    for &n in &[10usize, 100, 1000] {
        let follows: Vec<Follow> = (0..n).map(|_| follow_fixture(Decimal::new(50, 0))).collect();
        let trade = trade_fixture("market-1");
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(run_guard_chain(black_box(&follows), black_box(&trade))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_guard_chain_fanout);
criterion_main!(benches);
