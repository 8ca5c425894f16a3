//! Latency benchmarks for per-intent decision operations.
//!
//! Run with: `cargo bench --bench latency`

use chrono::Utc;
use copy_relay::core::types::{risk_gate_decision, CopyPolicy, Follow, RiskPolicy, Side};
use copy_relay::dispatcher::intended_notional;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use uuid::Uuid;

fn follow_fixture() -> Follow {
    Follow {
        id: Uuid::new_v4(),
        follower_address: "0xfollower".into(),
        leader_address: "0xleader".into(),
        copy_policy: CopyPolicy {
            enabled: true,
            copy_percentage: Decimal::new(50, 0),
            only_markets: vec![],
            exclude_markets: vec![],
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

fn bench_intent_id(c: &mut Criterion) {
    let follow_id = Uuid::new_v4();
    c.bench_function("intent_id hash", |b| {
        b.iter(|| black_box(copy_relay::core::intent_id(black_box("leader-trade-1"), black_box(follow_id))))
    });
}

fn bench_intended_notional(c: &mut Criterion) {
    let follow = follow_fixture();
    c.bench_function("intended_notional sizing", |b| {
        b.iter(|| black_box(intended_notional(black_box(&follow), black_box(Decimal::new(100, 0)))))
    });
}

fn bench_risk_gate_decision(c: &mut Criterion) {
    c.bench_function("risk_gate_decision", |b| {
        b.iter(|| {
            black_box(risk_gate_decision(
                black_box(Decimal::new(480, 0)),
                black_box(Decimal::new(50, 0)),
                black_box(Side::Buy),
                black_box(Some(Decimal::new(500, 0))),
                black_box(1),
                black_box(5),
            ))
        })
    });
}

criterion_group!(benches, bench_intent_id, bench_intended_notional, bench_risk_gate_decision);
criterion_main!(benches);
