//! Parabolic SAR: Wilder's acceleration factor system.
//!
//! Inherently sequential: each step folds one candle into an explicit
//! `SarState` of {sar, extreme point, trend, acceleration factor}.
//!
//! Seed: sar = extreme point = first close, trend up, af = af_start.
//! Step: sar += af * (ep - sar). An uptrend flips when low < sar, a downtrend
//! when high > sar; on a flip sar jumps to the old extreme point, the extreme
//! point resets to the candle's low (or high) and af resets. Without a flip, a
//! new extreme moves ep and raises af by af_step, capped at af_max.
//!
//! Parameters: af_start (default 0.02), af_step (default 0.02), af_max (default 0.20).
//! Lookback: 1 (index 0 only seeds the state).

use serde::{Deserialize, Serialize};

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarParams {
    pub af_start: f64,
    pub af_step: f64,
    pub af_max: f64,
}

impl Default for SarParams {
    fn default() -> Self {
        Self {
            af_start: 0.02,
            af_step: 0.02,
            af_max: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarState {
    pub sar: f64,
    pub extreme_point: f64,
    pub trend: TrendDirection,
    pub af: f64,
}

impl SarState {
    pub fn seed(first: &Candle, params: &SarParams) -> Self {
        Self {
            sar: first.close,
            extreme_point: first.close,
            trend: TrendDirection::Up,
            af: params.af_start,
        }
    }

    /// Fold one candle. Returns the next state and the emitted SAR value.
    pub fn step(self, candle: &Candle, params: &SarParams) -> (SarState, f64) {
        let mut next = self;
        next.sar = self.sar + self.af * (self.extreme_point - self.sar);

        match self.trend {
            TrendDirection::Up => {
                if candle.low < next.sar {
                    next.trend = TrendDirection::Down;
                    next.sar = self.extreme_point;
                    next.extreme_point = candle.low;
                    next.af = params.af_start;
                } else if candle.high > self.extreme_point {
                    next.extreme_point = candle.high;
                    next.af = (self.af + params.af_step).min(params.af_max);
                }
            }
            TrendDirection::Down => {
                if candle.high > next.sar {
                    next.trend = TrendDirection::Up;
                    next.sar = self.extreme_point;
                    next.extreme_point = candle.high;
                    next.af = params.af_start;
                } else if candle.low < self.extreme_point {
                    next.extreme_point = candle.low;
                    next.af = (self.af + params.af_step).min(params.af_max);
                }
            }
        }

        (next, next.sar)
    }
}

#[derive(Debug, Clone)]
pub struct ParabolicSar {
    params: SarParams,
    name: String,
}

impl ParabolicSar {
    pub fn new(af_start: f64, af_step: f64, af_max: f64) -> Self {
        assert!(af_start > 0.0, "AF start must be > 0");
        assert!(af_step > 0.0, "AF step must be > 0");
        assert!(af_max >= af_start, "AF max must be >= AF start");
        Self {
            params: SarParams {
                af_start,
                af_step,
                af_max,
            },
            name: format!("psar_{af_start}_{af_step}_{af_max}"),
        }
    }

    /// Default parameters: 0.02, 0.02, 0.20
    pub fn default_params() -> Self {
        let p = SarParams::default();
        Self::new(p.af_start, p.af_step, p.af_max)
    }

    pub fn params(&self) -> &SarParams {
        &self.params
    }

    /// Full state path, one entry per candle (index 0 is the seed).
    pub fn states(&self, candles: &[Candle]) -> Vec<SarState> {
        let Some(first) = candles.first() else {
            return Vec::new();
        };
        let mut state = SarState::seed(first, &self.params);
        let mut path = Vec::with_capacity(candles.len());
        path.push(state);
        for candle in &candles[1..] {
            if candle.high.is_nan() || candle.low.is_nan() {
                path.push(state);
                continue;
            }
            state = state.step(candle, &self.params).0;
            path.push(state);
        }
        path
    }
}

/// Number of trend reversals along a state path.
pub fn count_flips(path: &[SarState]) -> usize {
    path.windows(2).filter(|w| w[0].trend != w[1].trend).count()
}

impl Indicator for ParabolicSar {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut result = vec![f64::NAN; candles.len()];
        let Some(first) = candles.first() else {
            return result;
        };
        if first.close.is_nan() {
            return result;
        }

        let mut state = SarState::seed(first, &self.params);
        for (i, candle) in candles.iter().enumerate().skip(1) {
            if candle.high.is_nan() || candle.low.is_nan() {
                // NaN candle: emit NaN, keep state
                continue;
            }
            let (next, sar) = state.step(candle, &self.params);
            state = next;
            result[i] = sar;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_candles, DEFAULT_EPSILON};

    #[test]
    fn psar_uptrend_accelerates() {
        let data: Vec<(f64, f64, f64, f64)> = (0..10)
            .map(|i| {
                let c = 100.0 + i as f64 * 2.0;
                (c, c + 1.0, c, c)
            })
            .collect();
        let candles = make_ohlc_candles(&data);
        let sar = ParabolicSar::default_params();
        let path = sar.states(&candles);

        assert_eq!(count_flips(&path), 0);
        assert!(path.iter().all(|s| s.trend == TrendDirection::Up));
        // af grows by 0.02 on each new high
        assert_approx(path[1].af, 0.04, DEFAULT_EPSILON);
        assert_approx(path[9].af, 0.20, DEFAULT_EPSILON);
    }

    #[test]
    fn psar_first_step() {
        // seed: sar = ep = 100; step: sar stays 100, low 99 < 100 → flip down
        let candles = make_ohlc_candles(&[(100.0, 100.5, 99.5, 100.0), (100.0, 101.0, 99.0, 100.5)]);
        let result = ParabolicSar::default_params().compute(&candles);
        assert!(result[0].is_nan());
        assert_approx(result[1], 100.0, DEFAULT_EPSILON);

        let path = ParabolicSar::default_params().states(&candles);
        assert_eq!(path[1].trend, TrendDirection::Down);
        assert_approx(path[1].extreme_point, 99.0, DEFAULT_EPSILON);
        assert_approx(path[1].af, 0.02, DEFAULT_EPSILON);
    }

    #[test]
    fn psar_flat_series_never_flips() {
        let data = vec![(100.0, 100.0, 100.0, 100.0); 60];
        let candles = make_ohlc_candles(&data);
        let sar = ParabolicSar::default_params();
        assert_eq!(count_flips(&sar.states(&candles)), 0);
        let result = sar.compute(&candles);
        assert!(result[1..].iter().all(|&v| (v - 100.0).abs() < DEFAULT_EPSILON));
    }

    #[test]
    fn psar_reverses_on_crash() {
        let mut data: Vec<(f64, f64, f64, f64)> = (0..8)
            .map(|i| {
                let c = 100.0 + i as f64 * 3.0;
                (c, c + 1.0, c - 1.0, c)
            })
            .collect();
        data.push((120.0, 121.0, 80.0, 82.0));
        let candles = make_ohlc_candles(&data);
        let path = ParabolicSar::default_params().states(&candles);
        assert_eq!(path[8].trend, TrendDirection::Down);
        assert_approx(path[8].sar, path[7].extreme_point, DEFAULT_EPSILON);
    }

    #[test]
    fn psar_name() {
        assert_eq!(ParabolicSar::default_params().name(), "psar_0.02_0.02_0.2");
    }
}
