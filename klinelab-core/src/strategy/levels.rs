//! Support and resistance levels.
//!
//! Classic pivot over the trailing lookback window:
//! pivot = (high_n + low_n + close) / 3
//! r1 = 2*pivot - low_n, s1 = 2*pivot - high_n
//! r2 = pivot + (high_n - low_n), s2 = pivot - (high_n - low_n)
//!
//! The support set is {min(s1, s2, MA20, MA50), low_n}, sorted ascending; the
//! resistance set is {max(r1, r2, MA20, MA50), high_n}, sorted descending.
//! Moving averages use whatever tail is available when the series is shorter
//! than their window. Full precision throughout; rounding is presentation.

use serde::{Deserialize, Serialize};

use crate::config::LevelConfig;
use crate::domain::Candle;
use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub pivot: f64,
    /// Ascending.
    pub supports: [f64; 2],
    /// Descending.
    pub resistances: [f64; 2],
}

impl Levels {
    /// Nearest support (the higher of the two).
    pub fn support_1(&self) -> f64 {
        self.supports[1]
    }

    pub fn support_2(&self) -> f64 {
        self.supports[0]
    }

    /// Nearest resistance (the lower of the two).
    pub fn resistance_1(&self) -> f64 {
        self.resistances[1]
    }

    pub fn resistance_2(&self) -> f64 {
        self.resistances[0]
    }
}

pub fn compute_levels(candles: &[Candle], config: &LevelConfig) -> Result<Levels, AnalysisError> {
    let Some(last) = candles.last() else {
        return Err(AnalysisError::InsufficientHistory { needed: 1, got: 0 });
    };

    let window = tail(candles, config.lookback);
    let high = window
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    if !high.is_finite() || !low.is_finite() || last.close.is_nan() {
        return Err(AnalysisError::InsufficientHistory {
            needed: 1,
            got: 0,
        });
    }

    let pivot = (high + low + last.close) / 3.0;
    let range = high - low;
    let r1 = 2.0 * pivot - low;
    let s1 = 2.0 * pivot - high;
    let r2 = pivot + range;
    let s2 = pivot - range;

    let ma_short = mean_close(tail(candles, config.ma_short));
    let ma_long = mean_close(tail(candles, config.ma_long));

    let support = [s1, s2, ma_short, ma_long]
        .into_iter()
        .fold(f64::INFINITY, f64::min);
    let resistance = [r1, r2, ma_short, ma_long]
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max);

    let mut supports = [support, low];
    supports.sort_by(f64::total_cmp);
    let mut resistances = [resistance, high];
    resistances.sort_by(|a, b| b.total_cmp(a));

    Ok(Levels {
        pivot,
        supports,
        resistances,
    })
}

fn tail(candles: &[Candle], n: usize) -> &[Candle] {
    &candles[candles.len().saturating_sub(n)..]
}

fn mean_close(candles: &[Candle]) -> f64 {
    let closes: Vec<f64> = candles
        .iter()
        .map(|c| c.close)
        .filter(|v| !v.is_nan())
        .collect();
    if closes.is_empty() {
        return f64::NAN;
    }
    closes.iter().sum::<f64>() / closes.len() as f64
}

/// Round to cents for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, make_ohlc_candles};

    #[test]
    fn pivot_levels_for_flat_series() {
        let data = vec![(100.0, 100.0, 100.0, 100.0); 60];
        let levels = compute_levels(&make_ohlc_candles(&data), &LevelConfig::default()).unwrap();
        assert_approx(levels.pivot, 100.0, 1e-12);
        assert_approx(levels.support_1(), 100.0, 1e-12);
        assert_approx(levels.resistance_1(), 100.0, 1e-12);
    }

    #[test]
    fn pivot_arithmetic() {
        // window high 110, low 90, last close 100 → pivot 100, range 20
        let candles = make_ohlc_candles(&[
            (100.0, 110.0, 95.0, 105.0),
            (105.0, 106.0, 90.0, 100.0),
        ]);
        let levels = compute_levels(&candles, &LevelConfig::default()).unwrap();
        assert_approx(levels.pivot, 100.0, 1e-12);
        // s2 = 80 is the lowest candidate; supports ascending {80, 90}
        assert_eq!(levels.supports, [80.0, 90.0]);
        // r2 = 120 is the highest candidate; resistances descending {120, 110}
        assert_eq!(levels.resistances, [120.0, 110.0]);
        assert_eq!(levels.support_1(), 90.0);
        assert_eq!(levels.support_2(), 80.0);
        assert_eq!(levels.resistance_1(), 110.0);
        assert_eq!(levels.resistance_2(), 120.0);
    }

    #[test]
    fn only_lookback_window_counts() {
        let mut data = vec![(50.0, 500.0, 1.0, 50.0)];
        data.extend(vec![(100.0, 101.0, 99.0, 100.0); 30]);
        let levels = compute_levels(&make_ohlc_candles(&data), &LevelConfig::default()).unwrap();
        assert_approx(levels.resistance_1(), 101.0, 1e-12);
        assert_approx(levels.support_1(), 99.0, 1e-12);
    }

    #[test]
    fn nearest_levels_bracket_ordering() {
        let closes: Vec<f64> = (0..45).map(|i| 100.0 + (i as f64 * 0.5).sin() * 8.0).collect();
        let levels = compute_levels(&make_candles(&closes), &LevelConfig::default()).unwrap();
        assert!(levels.support_1() >= levels.support_2());
        assert!(levels.resistance_1() <= levels.resistance_2());
        assert!(levels.support_1() <= levels.resistance_1());
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = compute_levels(&[], &LevelConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientHistory { .. }));
    }

    #[test]
    fn rounding_is_presentation_only() {
        assert_eq!(round2(123.456), 123.46);
        assert_eq!(round2(-0.004), -0.0);
    }
}
