//! Criterion benchmarks for the per-cycle hot path.
//!
//! Benchmarks:
//! 1. Single indicators over a day of minute bars
//! 2. Full engine pass (base frame plus four timeframe views)
//! 3. Bias and confluence scoring of a prepared analysis
//! 4. Reference merge plus live splice into the store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use nqfuse_core::analysis::IndicatorEngine;
use nqfuse_core::domain::Bar;
use nqfuse_core::indicators::{Ema, Indicator, Macd, MacdLine, Rsi, SessionVwap, StochasticK};
use nqfuse_core::scoring::{BiasScorer, ConfluenceScorer};
use nqfuse_core::series::{OpeningRange, TimeSeries};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 18000.0 + (i as f64 * 0.05).sin() * 40.0;
            let open = close - 0.75;
            Bar {
                ts: start + chrono::Duration::minutes(i as i64),
                open,
                high: close + 3.0,
                low: open - 3.0,
                close,
                volume: 500 + (i as u64 % 700),
            }
        })
        .collect()
}

// ── Indicators ───────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Ema::new(50)),
        Box::new(Macd::standard(MacdLine::Signal)),
        Box::new(Rsi::new(14)),
        Box::new(StochasticK::new(14)),
        Box::new(SessionVwap::new()),
    ];

    for bar_count in [390usize, 1440] {
        let bars = make_bars(bar_count);
        for ind in &indicators {
            group.bench_with_input(
                BenchmarkId::new(ind.name().to_string(), bar_count),
                &bars,
                |b, bars| b.iter(|| ind.compute(black_box(bars))),
            );
        }
    }
    group.finish();
}

// ── Engine ───────────────────────────────────────────────────────────

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_analyze");
    let engine = IndicatorEngine::default();

    for bar_count in [390usize, 1440, 10_000] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("all_timeframes", bar_count), &bars, |b, bars| {
            b.iter(|| engine.analyze(black_box(bars.clone())))
        });
    }
    group.finish();
}

// ── Scoring ──────────────────────────────────────────────────────────

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let analysis = IndicatorEngine::default().analyze(make_bars(1440));
    let bias = BiasScorer::new();
    let confluence = ConfluenceScorer::new();
    let or = OpeningRange::fixed(18030.0, 17970.0);

    group.bench_function("bias", |b| b.iter(|| bias.evaluate(black_box(&analysis.base))));
    group.bench_function("confluence", |b| {
        b.iter(|| confluence.evaluate(black_box(&analysis.base), &analysis.views, or))
    });
    group.finish();
}

// ── Store ────────────────────────────────────────────────────────────

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    let bars = make_bars(1440);
    let now = bars[bars.len() - 1].ts + chrono::Duration::seconds(30);

    group.bench_function("merge_1440_then_splice", |b| {
        b.iter(|| {
            let mut store = TimeSeries::default();
            store.merge_reference(black_box(&bars));
            store.splice(black_box(18001.25), now)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_indicators, bench_engine, bench_scoring, bench_store);
criterion_main!(benches);
