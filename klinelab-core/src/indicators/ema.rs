//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1).
//! Seeded with the first observation (no averaging warmup), so the series is
//! defined from index 0. MACD and KDJ smoothing build on `ewm_of_series`.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
    name: String,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }

    pub fn alpha(&self) -> f64 {
        span_alpha(self.span)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        ewm_of_series(&closes, self.alpha())
    }
}

/// Smoothing constant for a span.
pub fn span_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponentially weighted mean of an arbitrary series.
///
/// Leading NaNs stay NaN; the first finite value seeds the recursion. A NaN
/// after the seed yields NaN at that index and leaves the running state
/// untouched.
pub fn ewm_of_series(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        result[i] = next;
        prev = Some(next);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn ema_seeds_with_first_value() {
        let candles = make_candles(&[10.0, 20.0, 30.0]);
        let result = Ema::new(3).compute(&candles);
        // alpha = 0.5
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 15.0, DEFAULT_EPSILON);
        assert_approx(result[2], 22.5, DEFAULT_EPSILON);
    }

    #[test]
    fn ewm_skips_leading_nan() {
        let result = ewm_of_series(&[f64::NAN, f64::NAN, 9.0, 0.0], 1.0 / 3.0);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 9.0, DEFAULT_EPSILON);
        assert_approx(result[3], 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ewm_constant_series_is_constant() {
        let result = ewm_of_series(&[42.0; 30], span_alpha(12));
        assert!(result.iter().all(|&v| (v - 42.0).abs() < DEFAULT_EPSILON));
    }
}
