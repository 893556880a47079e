//! Property-based tests for the extractor, the store and the scoring bounds.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use nqfuse_core::analysis::{keys, IndicatorFrame};
use nqfuse_core::domain::{Bar, Instrument};
use nqfuse_core::extraction::{ExtractorSettings, PriceExtractor, TextToken};
use nqfuse_core::indicators::{Indicator, IndicatorValues, Rsi};
use nqfuse_core::scoring::{BiasScorer, ConfluenceScorer};
use nqfuse_core::series::{OpeningRange, TimeSeries, Timeframe};
use proptest::prelude::*;

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

// ── Strategies ──

/// Words the recogniser might hand back: prices, garbage, concatenations.
fn arb_word() -> impl Strategy<Value = String> {
    prop_oneof![
        (1000.0..60000.0f64).prop_map(|p| format!("{p:.2}")),
        (1000u32..60000).prop_map(|p| p.to_string()),
        (1000.0..60000.0f64).prop_map(|p| format!("{p:.3}")),
        "[0-9.,A-Za-z ]{0,12}",
        (100000u32..9999999).prop_map(|p| p.to_string()),
    ]
}

fn arb_tokens() -> impl Strategy<Value = Vec<TextToken>> {
    prop::collection::vec(arb_word(), 0..12).prop_map(|words| {
        words
            .into_iter()
            .enumerate()
            .map(|(i, w)| TextToken::new(w, 0, i as i32 * 14, 60, 12))
            .collect()
    })
}

fn arb_bounds() -> impl Strategy<Value = (f64, f64)> {
    (1000.0..50000.0f64, 0.0..20000.0f64).prop_map(|(lo, span)| (lo, lo + span))
}

/// Store operations: a reference batch or a live splice at some minute offset.
#[derive(Debug, Clone)]
enum StoreOp {
    Merge(Vec<(i64, f64)>),
    Splice(i64, f64),
}

fn arb_store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        prop::collection::vec((0i64..120, 17000.0..19000.0f64), 0..10).prop_map(StoreOp::Merge),
        ((0i64..7200), 17000.0..19000.0f64).prop_map(|(secs, p)| StoreOp::Splice(secs, p)),
    ]
}

fn opt_value(lo: f64, hi: f64) -> impl Strategy<Value = Option<f64>> {
    prop_oneof![Just(None), (lo..hi).prop_map(Some)]
}

/// Values for every indicator column of one row; `None` becomes NaN.
fn arb_row_values() -> impl Strategy<Value = Vec<(&'static str, Option<f64>)>> {
    let price = || opt_value(17000.0, 19000.0);
    (
        (price(), price(), price(), price(), price()),
        (opt_value(-50.0, 50.0), opt_value(-50.0, 50.0), opt_value(-50.0, 50.0)),
        (opt_value(0.0, 100.0), opt_value(0.0, 100.0), opt_value(0.0, 100.0)),
        (price(), price(), price()),
    )
        .prop_map(|((e9, e21, e50, vwap, mid), (m, s, h), (rsi, k, d), (up, lo, _))| {
            vec![
                (keys::EMA_FAST, e9),
                (keys::EMA_MID, e21),
                (keys::EMA_SLOW, e50),
                (keys::VWAP, vwap),
                (keys::BB_MIDDLE, mid),
                (keys::MACD, m),
                (keys::MACD_SIGNAL, s),
                (keys::MACD_HIST, h),
                (keys::RSI, rsi),
                (keys::STOCH_K, k),
                (keys::STOCH_D, d),
                (keys::BB_UPPER, up),
                (keys::BB_LOWER, lo),
            ]
        })
}

/// A frame of `n` bars whose last row carries the given values, NaN elsewhere.
fn frame_with_last_row(
    tf: Option<Timeframe>,
    n: usize,
    close: f64,
    volume: u64,
    row: &[(&'static str, Option<f64>)],
) -> IndicatorFrame {
    let bars: Vec<Bar> = (0..n)
        .map(|i| Bar {
            volume: if i + 1 == n { volume } else { 1000 },
            ..Bar::flat(t0() + Duration::minutes(i as i64), close)
        })
        .collect();
    let mut values = IndicatorValues::new();
    for &(key, v) in row {
        let mut series = vec![f64::NAN; n];
        series[n - 1] = v.unwrap_or(f64::NAN);
        values.insert(key, series);
    }
    IndicatorFrame::new(tf, bars, values)
}

// ── Price extractor ──

proptest! {
    /// Every extracted value lies within the configured bounds and on the tick grid.
    #[test]
    fn extractor_output_in_bounds_and_on_tick(
        (min_px, max_px) in arb_bounds(),
        reads in prop::collection::vec(arb_tokens(), 1..6),
    ) {
        let settings = ExtractorSettings { min_px, max_px, ..ExtractorSettings::default() };
        let tick = Instrument::nq();
        let mut extractor = PriceExtractor::new(tick.clone(), settings).unwrap();

        for tokens in &reads {
            if let Some(p) = extractor.extract_from_tokens(tokens) {
                prop_assert!(p >= min_px && p <= max_px, "{p} outside [{min_px}, {max_px}]");
                prop_assert!(tick.is_on_tick(p), "{p} not on the 0.25 grid");
            }
        }
    }

    /// A candidate further than max_jump from the last accepted price yields exactly that price.
    #[test]
    fn extractor_jump_gate_returns_last_price(
        first in 10000u32..30000,
        jump in 61.0..5000.0f64,
        up in any::<bool>(),
    ) {
        let mut extractor =
            PriceExtractor::new(Instrument::nq(), ExtractorSettings::default()).unwrap();
        let p = f64::from(first);
        prop_assert_eq!(extractor.select(vec![p]), Some(p));

        let next = if up { p + jump } else { p - jump };
        prop_assert_eq!(extractor.select(vec![next]), Some(p));
        prop_assert_eq!(extractor.last_good(), Some(p));
    }
}

// ── Time-series store ──

proptest! {
    /// After any interleaving of merges and splices the series is strictly ascending,
    /// and a splice never rewrites a bar older than the newest one.
    #[test]
    fn store_sorted_and_unique(ops in prop::collection::vec(arb_store_op(), 0..30)) {
        let mut store = TimeSeries::new(500);
        for op in ops {
            match op {
                StoreOp::Merge(batch) => {
                    let bars: Vec<Bar> = batch
                        .into_iter()
                        .map(|(m, p)| Bar::flat(t0() + Duration::minutes(m), p))
                        .collect();
                    store.merge_reference(&bars);
                }
                StoreOp::Splice(secs, p) => {
                    let before = store.snapshot();
                    store.splice(p, t0() + Duration::seconds(secs));
                    let after = store.snapshot();
                    // every bar but the newest is left exactly as it was
                    if let Some((_, settled)) = before.split_last() {
                        prop_assert!(after.len() >= before.len());
                        prop_assert_eq!(&after[..settled.len()], settled);
                    }
                }
            }
        }
        let bars = store.snapshot();
        prop_assert!(bars.windows(2).all(|w| w[0].ts < w[1].ts));
        prop_assert!(bars.iter().all(|b| b.ts.second() == 0 && b.ts.nanosecond() == 0));
    }

    /// Splicing the same price into the same minute twice equals splicing it once.
    #[test]
    fn splice_is_idempotent(
        seed in prop::collection::vec(17000.0..19000.0f64, 1..5),
        price in 17000.0..19000.0f64,
        secs in 0i64..600,
    ) {
        let bars: Vec<Bar> = seed
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::flat(t0() + Duration::minutes(i as i64), p))
            .collect();
        let mut store = TimeSeries::new(100);
        store.merge_reference(&bars);

        let now = t0() + Duration::seconds(secs);
        store.splice(price, now);
        let once = store.snapshot();
        store.splice(price, now);
        prop_assert_eq!(store.snapshot(), once);
    }
}

// ── Indicators and scoring ──

proptest! {
    /// RSI stays within [0, 100] wherever it is defined.
    #[test]
    fn rsi_bounded(closes in prop::collection::vec(17000.0..19000.0f64, 15..120)) {
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::flat(t0() + Duration::minutes(i as i64), c))
            .collect();
        for v in Rsi::new(14).compute(&bars) {
            prop_assert!(v.is_nan() || (0.0..=100.0).contains(&v), "rsi {v}");
        }
    }

    /// Confluence stays within [0, 100] for any mix of present and missing indicators.
    #[test]
    fn confluence_bounded(
        base_row in arb_row_values(),
        view_rows in prop::collection::vec(arb_row_values(), 3),
        close in 17000.0..19000.0f64,
        volume in 0u64..100_000,
        or in (any::<bool>(), 17000.0..19000.0f64, 0.0..200.0f64),
        n in 30usize..60,
    ) {
        let base = frame_with_last_row(None, n, close, volume, &base_row);
        let views: Vec<IndicatorFrame> = [Timeframe::H4, Timeframe::M60, Timeframe::M15]
            .into_iter()
            .zip(&view_rows)
            .map(|(tf, row)| frame_with_last_row(Some(tf), 1, close, 1000, row))
            .collect();
        let (ready, low, width) = or;
        let opening_range = OpeningRange { high: Some(low + width), low: Some(low), ready };

        let result = ConfluenceScorer::new().evaluate(&base, &views, opening_range);
        prop_assert!(result.score <= 100);
        prop_assert!(result.ready);
        prop_assert!(result.reasons.len() <= 8);

        let bias = BiasScorer::new().evaluate(&base);
        prop_assert!(bias.score <= 100);
    }

    /// An all-undefined row degrades to exactly neutral with no reasons.
    #[test]
    fn confluence_all_missing_is_neutral(n in 30usize..80, close in 17000.0..19000.0f64) {
        let row: Vec<(&'static str, Option<f64>)> = [
            keys::EMA_FAST, keys::EMA_MID, keys::EMA_SLOW, keys::MACD, keys::MACD_SIGNAL,
            keys::MACD_HIST, keys::RSI, keys::STOCH_K, keys::STOCH_D, keys::BB_UPPER,
            keys::BB_MIDDLE, keys::BB_LOWER, keys::VWAP,
        ]
        .into_iter()
        .map(|k| (k, None))
        .collect();
        let base = frame_with_last_row(None, n, close, 1000, &row);

        let result = ConfluenceScorer::new().evaluate(&base, &[], OpeningRange::default());
        prop_assert_eq!(result.score, 50);
        prop_assert!(result.reasons.is_empty());
    }
}
