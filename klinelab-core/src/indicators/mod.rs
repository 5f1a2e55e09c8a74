//! Indicator library.
//!
//! Every indicator is a pure function of an ordered candle series: candles in,
//! a numeric series of the same length out. Leading values are `f64::NAN`
//! until enough history exists (`lookback()`).
//!
//! Multi-series indicators (KDJ, MACD, Bollinger) are exposed as separate
//! named instances per line, keeping the single-series `Indicator` trait
//! unchanged. The sequential indicators (Parabolic SAR, OBV) are folds over an
//! explicit state struct with a `step(state, candle) -> (state, output)` API.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod parabolic_sar;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use adx::Adx;
pub use atr::{true_range, wilder_smooth, Atr};
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::{ewm_of_series, span_alpha, Ema};
pub use kdj::{Kdj, KdjLine};
pub use macd::{Macd, MacdLine};
pub use parabolic_sar::{count_flips, ParabolicSar, SarParams, SarState, TrendDirection};
pub use rsi::Rsi;
pub use sma::{sma_of_series, PriceField, Sma};
pub use volume::{Obv, ObvState};

use crate::domain::Candle;
use std::collections::HashMap;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on candles after t. Truncating the input
/// series must never change the values computed for the retained prefix.
pub trait Indicator: Send + Sync {
    /// Column name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the whole series.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Named indicator columns, each the same length as the candle series.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the value at a specific candle index.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied())
    }

    /// Get the full series for a named indicator.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Iterate over column names (unordered).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Synthetic candles from close prices for tests.
///
/// Daily candles starting 2024-01-02: open = prev close (or close for the
/// first), high = max(open, close) + 1.0, low = min(open, close) - 1.0,
/// volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let open_time = base + Duration::days(i as i64);
            Candle::new(
                open_time,
                open_time + Duration::days(1) - Duration::milliseconds(1),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Synthetic candles from (open, high, low, close) tuples, volume 1000.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            let open_time = base + Duration::days(i as i64);
            Candle::new(
                open_time,
                open_time + Duration::days(1) - Duration::milliseconds(1),
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
