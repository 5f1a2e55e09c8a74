//! Property tests for indicator and strategy invariants.
//!
//! Uses proptest to verify:
//! 1. RSI stays within [0, 100]
//! 2. Strictly rising closes give a bullish MA-ordering vote
//! 3. Support/resistance levels keep their sort order
//! 4. ADX is finite after warmup, including flat stretches
//! 5. The composite score never exceeds the boosted bound
//! 6. Sync fetch windows tile the missing range

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use klinelab_core::config::{IndicatorConfig, LevelConfig, ScoringConfig};
use klinelab_core::data::fetch_windows;
use klinelab_core::domain::Candle;
use klinelab_core::frame::IndicatorFrame;
use klinelab_core::indicators::{Adx, Indicator, Rsi};
use klinelab_core::strategy::{compute_levels, score, votes, RegimeLabel, SignalKind};

// ── Strategies (proptest) ────────────────────────────────────────────

fn build_candles(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut prev_close = bars.first().map_or(100.0, |b| b.0);
    bars.iter()
        .enumerate()
        .map(|(i, &(close, up, down, volume))| {
            let open_time = base + Duration::hours(i as i64);
            let open = prev_close;
            prev_close = close;
            Candle::new(
                open_time,
                open_time + Duration::hours(1) - Duration::milliseconds(1),
                open,
                open.max(close) + up,
                open.min(close) - down,
                close,
                volume,
            )
        })
        .collect()
}

fn arb_bar() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (50.0..5000.0_f64, 0.0..20.0_f64, 0.0..20.0_f64, 0.0..1000.0_f64)
}

fn arb_candles(min: usize, max: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec(arb_bar(), min..max).prop_map(|bars| build_candles(&bars))
}

fn arb_rising_closes() -> impl Strategy<Value = Vec<f64>> {
    (10.0..1000.0_f64, prop::collection::vec(0.01..50.0_f64, 25..80)).prop_map(|(start, steps)| {
        let mut close = start;
        steps
            .into_iter()
            .map(|s| {
                close += s;
                close
            })
            .collect()
    })
}

// ── 1. RSI bounds ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(candles in arb_candles(2, 150), period in 2usize..30) {
        let rsi = Rsi::new(period).compute(&candles);
        prop_assert_eq!(rsi.len(), candles.len());
        for v in rsi.iter().filter(|v| !v.is_nan()) {
            prop_assert!((0.0..=100.0).contains(v), "rsi out of range: {}", v);
        }
    }

    /// Zero losses saturate at 100 rather than dividing by zero.
    #[test]
    fn rsi_without_losses_is_100(closes in arb_rising_closes()) {
        let bars: Vec<_> = closes.iter().map(|&c| (c, 1.0, 1.0, 10.0)).collect();
        let rsi = Rsi::new(14).compute(&build_candles(&bars));
        let last = rsi[rsi.len() - 1];
        prop_assert!((last - 100.0).abs() < 1e-9);
    }
}

// ── 2. MA ordering vote ──────────────────────────────────────────────

proptest! {
    #[test]
    fn rising_closes_vote_ma_bullish(closes in arb_rising_closes()) {
        let bars: Vec<_> = closes.iter().map(|&c| (c, 1.0, 1.0, 10.0)).collect();
        let frame = IndicatorFrame::compute(build_candles(&bars), &IndicatorConfig::default());
        let row = frame.latest().unwrap();
        prop_assert!(row.ma(5) > row.ma(10) && row.ma(10) > row.ma(20));

        let obv = frame.series(&frame.columns().obv).unwrap();
        let v = votes(&row, obv, row.close, &ScoringConfig::default());
        prop_assert_eq!(v[&SignalKind::Ma], 1.0);
    }
}

// ── 3. Level ordering ────────────────────────────────────────────────

proptest! {
    #[test]
    fn levels_keep_sort_order(candles in arb_candles(1, 120)) {
        let levels = compute_levels(&candles, &LevelConfig::default()).unwrap();
        prop_assert!(levels.supports[0] <= levels.supports[1]);
        prop_assert!(levels.resistances[0] >= levels.resistances[1]);
        prop_assert!(levels.support_1() >= levels.support_2());
        prop_assert!(levels.resistance_1() <= levels.resistance_2());
    }
}

// ── 4. ADX finiteness ────────────────────────────────────────────────

proptest! {
    #[test]
    fn adx_is_finite_after_warmup(
        candles in arb_candles(30, 120),
        flat_len in 0usize..40,
    ) {
        let mut candles = candles;
        // Append a perfectly flat stretch: both directional indices go to zero.
        if let Some(last) = candles.last().cloned() {
            for i in 0..flat_len {
                let open_time = last.open_time + Duration::hours(i as i64 + 1);
                candles.push(Candle::new(
                    open_time,
                    open_time + Duration::hours(1) - Duration::milliseconds(1),
                    last.close,
                    last.close,
                    last.close,
                    last.close,
                    0.0,
                ));
            }
        }
        let adx = Adx::new(14);
        let values = adx.compute(&candles);
        for v in &values[adx.lookback()..] {
            prop_assert!(v.is_finite());
            prop_assert!((0.0..=100.0).contains(v));
        }
    }
}

// ── 5. Composite score bound ─────────────────────────────────────────

proptest! {
    #[test]
    fn score_is_bounded(candles in arb_candles(1, 120), trending in any::<bool>()) {
        let price = candles[candles.len() - 1].close;
        let frame = IndicatorFrame::compute(candles, &IndicatorConfig::default());
        let regime = if trending { RegimeLabel::Trending } else { RegimeLabel::Ranging };
        let s = score(&frame, price, regime, &ScoringConfig::default());
        prop_assert!(s.score.is_finite());
        prop_assert!(s.score.abs() <= 1.5 + 1e-9);
    }
}

// ── 6. Fetch windows ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn fetch_windows_tile_the_range(offset in 0i64..400, len in 0i64..120, days in 1u32..10) {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(offset);
        let end = start + Duration::days(len);
        let windows = fetch_windows(start, end, days);

        prop_assert_eq!(windows.first().map(|w| w.0), Some(start));
        prop_assert_eq!(windows.last().map(|w| w.1), Some(end));
        for w in &windows {
            prop_assert!(w.0 <= w.1);
            prop_assert!((w.1 - w.0).num_days() < i64::from(days));
        }
        for pair in windows.windows(2) {
            prop_assert_eq!(pair[1].0, pair[0].1 + Duration::days(1));
        }
    }
}
