//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window, of closes or of volume.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;
use crate::domain::Candle;

/// Which candle field a single-input indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Close,
    Volume,
}

impl PriceField {
    pub fn extract(&self, candles: &[Candle]) -> Vec<f64> {
        match self {
            PriceField::Close => candles.iter().map(|c| c.close).collect(),
            PriceField::Volume => candles.iter().map(|c| c.volume).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    field: PriceField,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            field: PriceField::Close,
            name: format!("sma_{period}"),
        }
    }

    /// Moving average of volume (e.g. "volume_sma_10").
    pub fn of_volume(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            field: PriceField::Volume,
            name: format!("volume_sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        sma_of_series(&self.field.extract(candles), self.period)
    }
}

/// Rolling mean of an arbitrary series.
///
/// A window containing NaN yields NaN; the output recovers once the NaN
/// leaves the window.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_in_window = 0usize;
    for i in 0..n {
        let entering = values[i];
        if entering.is_nan() {
            nan_in_window += 1;
        } else {
            sum += entering;
        }

        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_in_window -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= period && nan_in_window == 0 {
            result[i] = sum / period as f64;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let result = Sma::new(5).compute(&candles);

        assert_eq!(result.len(), 7);
        for v in result.iter().take(4) {
            assert!(v.is_nan());
        }
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_of_volume() {
        let mut candles = make_candles(&[1.0, 1.0, 1.0, 1.0]);
        for (i, c) in candles.iter_mut().enumerate() {
            c.volume = (i as f64 + 1.0) * 10.0;
        }
        let sma = Sma::of_volume(2);
        assert_eq!(sma.name(), "volume_sma_2");
        let result = sma.compute(&candles);
        assert_approx(result[1], 15.0, DEFAULT_EPSILON);
        assert_approx(result[3], 35.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_propagation() {
        let mut candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        candles[2].close = f64::NAN;
        let result = Sma::new(3).compute(&candles);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
        assert_approx(result[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 19);
        assert_eq!(Sma::new(1).lookback(), 0);
    }

    #[test]
    fn sma_too_few_candles() {
        let candles = make_candles(&[10.0, 11.0]);
        let result = Sma::new(5).compute(&candles);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
