//! KDJ stochastic oscillator.
//!
//! RSV = (close - lowest_low(N)) / (highest_high(N) - lowest_low(N)) * 100
//! K = EWM(RSV, alpha = 1/3), D = EWM(K, alpha = 1/3), J = 3K - 2D.
//!
//! A flat window (highest == lowest) carries the previous RSV forward; with no
//! previous value it is 50.
//! Lookback: N - 1.

use super::ema::ewm_of_series;
use super::Indicator;
use crate::domain::Candle;

/// Smoothing constant for both K and D.
pub const KDJ_SMOOTHING: f64 = 1.0 / 3.0;

/// Which KDJ line to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdjLine {
    K,
    D,
    J,
}

#[derive(Debug, Clone)]
pub struct Kdj {
    period: usize,
    line: KdjLine,
    name: String,
}

impl Kdj {
    fn with_line(period: usize, line: KdjLine) -> Self {
        assert!(period >= 1, "KDJ period must be >= 1");
        let tag = match line {
            KdjLine::K => "k",
            KdjLine::D => "d",
            KdjLine::J => "j",
        };
        Self {
            period,
            line,
            name: format!("kdj_{tag}_{period}"),
        }
    }

    pub fn k(period: usize) -> Self {
        Self::with_line(period, KdjLine::K)
    }

    pub fn d(period: usize) -> Self {
        Self::with_line(period, KdjLine::D)
    }

    pub fn j(period: usize) -> Self {
        Self::with_line(period, KdjLine::J)
    }
}

impl Indicator for Kdj {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let (k, d, j) = kdj(candles, self.period);
        match self.line {
            KdjLine::K => k,
            KdjLine::D => d,
            KdjLine::J => j,
        }
    }
}

/// Raw stochastic value series.
pub fn rsv(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut prev: Option<f64> = None;
    for i in (period - 1)..n {
        let window = &candles[(i + 1 - period)..=i];
        let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let highest = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let close = candles[i].close;

        if close.is_nan() || !lowest.is_finite() || !highest.is_finite() {
            continue;
        }

        let value = if highest > lowest {
            (close - lowest) / (highest - lowest) * 100.0
        } else {
            prev.unwrap_or(50.0)
        };
        result[i] = value;
        prev = Some(value);
    }

    result
}

/// Compute the (K, D, J) series together.
pub fn kdj(candles: &[Candle], period: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let raw = rsv(candles, period);
    let k = ewm_of_series(&raw, KDJ_SMOOTHING);
    let d = ewm_of_series(&k, KDJ_SMOOTHING);
    let j = k
        .iter()
        .zip(&d)
        .map(|(&k, &d)| 3.0 * k - 2.0 * d)
        .collect();
    (k, d, j)
}
