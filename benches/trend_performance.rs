//! Performance benchmarks for ledger-derived statistics

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scriptorium::rating::{average_opponent_elo, trend, win_rate};
use scriptorium::types::{ComparisonType, Outcome, RatingHistoryEntry};

fn build_ledger(entries: usize) -> Vec<RatingHistoryEntry> {
    let now = Utc::now();
    let mut elo = 1200;
    (0..entries)
        .map(|i| {
            let delta = if i % 3 == 0 { -7 } else { 5 };
            let entry = RatingHistoryEntry {
                user_id: "bench-user".to_string(),
                old_elo: elo,
                new_elo: elo + delta,
                opponent_elo: 1200 + (i as i32 % 50),
                reason: "pairwise_comparison".to_string(),
                comparison_id: format!("cmp-{}", i),
                job_id: format!("job-{}", i),
                outcome: if delta > 0 { Outcome::Win } else { Outcome::Loss },
                comparison_type: ComparisonType::Pairwise,
                k_factor_used: 32,
                changed_at: now - Duration::hours((entries - i) as i64),
            };
            elo += delta;
            entry
        })
        .collect()
}

fn bench_trend(c: &mut Criterion) {
    let small = build_ledger(100);
    let large = build_ledger(10_000);
    let now = Utc::now();

    c.bench_function("trend_100_entries", |b| {
        b.iter(|| trend(black_box(&small), black_box(7), now))
    });
    c.bench_function("trend_10k_entries", |b| {
        b.iter(|| trend(black_box(&large), black_box(30), now))
    });
}

fn bench_derived_stats(c: &mut Criterion) {
    let ledger = build_ledger(10_000);
    let now = Utc::now();

    c.bench_function("win_rate_10k_entries", |b| {
        b.iter(|| win_rate(black_box(&ledger), None, now))
    });
    c.bench_function("average_opponent_10k_entries", |b| {
        b.iter(|| average_opponent_elo(black_box(&ledger), Some(30), now))
    });
}

criterion_group!(benches, bench_trend, bench_derived_stats);
criterion_main!(benches);
