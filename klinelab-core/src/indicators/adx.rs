//! ADX: Average Directional Index.
//!
//! Steps:
//! 1. +DM and -DM from consecutive candles (only the larger positive move counts)
//! 2. Trailing means of +DM, -DM and TR over `period`
//! 3. +DI = 100 * mean(+DM) / mean(TR), -DI likewise (0 when mean(TR) is 0)
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), 0 when both are 0
//! 5. ADX = trailing mean of DX over `period`
//!
//! Lookback: 2 * period - 1.

use super::atr::true_range;
use super::sma::sma_of_series;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

/// Positive and negative directional movement. Index 0 is NaN.
pub fn directional_movement(candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    let n = candles.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let (cur, prev) = (&candles[i], &candles[i - 1]);
        if cur.high.is_nan() || cur.low.is_nan() || prev.high.is_nan() || prev.low.is_nan() {
            continue;
        }
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;

        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    (plus_dm, minus_dm)
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let (plus_dm, minus_dm) = directional_movement(candles);

        let mean_tr = sma_of_series(&true_range(candles), self.period);
        let mean_plus = sma_of_series(&plus_dm, self.period);
        let mean_minus = sma_of_series(&minus_dm, self.period);

        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            let (tr, p, m) = (mean_tr[i], mean_plus[i], mean_minus[i]);
            if tr.is_nan() || p.is_nan() || m.is_nan() {
                continue;
            }
            let (plus_di, minus_di) = if tr == 0.0 {
                (0.0, 0.0)
            } else {
                (100.0 * p / tr, 100.0 * m / tr)
            };
            let di_sum = plus_di + minus_di;
            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        sma_of_series(&dx, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, make_ohlc_candles, DEFAULT_EPSILON};

    #[test]
    fn adx_strong_uptrend() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + 2.0 * i as f64).collect();
        let result = Adx::new(5).compute(&make_candles(&closes));
        // every move is +DM only → DX = 100
        assert_approx(result[39], 100.0, 1e-9);
    }

    #[test]
    fn adx_flat_series_is_zero() {
        let data = vec![(100.0, 100.0, 100.0, 100.0); 30];
        let result = Adx::new(14).compute(&make_ohlc_candles(&data));
        assert!(result[26].is_nan());
        assert_approx(result[27], 0.0, DEFAULT_EPSILON);
        assert_approx(result[29], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn adx_both_di_zero_is_defined() {
        // constant range, no directional movement, nonzero TR
        let data = vec![(100.0, 101.0, 99.0, 100.0); 20];
        let result = Adx::new(3).compute(&make_ohlc_candles(&data));
        assert!(result[19].is_finite());
        assert_approx(result[19], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn adx_bounded() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 10.0)
            .collect();
        let result = Adx::new(14).compute(&make_candles(&closes));
        for v in result.iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn equal_moves_cancel() {
        let candles = make_ohlc_candles(&[(10.0, 11.0, 9.0, 10.0), (10.0, 12.0, 8.0, 10.0)]);
        let (p, m) = directional_movement(&candles);
        assert_eq!(p[1], 0.0);
        assert_eq!(m[1], 0.0);
    }

    #[test]
    fn adx_lookback() {
        assert_eq!(Adx::new(14).lookback(), 27);
    }
}
