//! MACD: moving average convergence/divergence.
//!
//! line = EMA(close, fast) - EMA(close, slow)
//! signal = EMA(line, signal_span)
//! histogram = line - signal
//!
//! All three EMAs are seeded with their first observation, so the series is
//! defined from index 0 (values are unreliable until roughly `slow` candles).

use super::ema::{ewm_of_series, span_alpha};
use super::Indicator;
use crate::domain::Candle;

/// Which MACD line to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD spans must be >= 1");
        assert!(fast < slow, "MACD fast span must be shorter than slow span");
        let tag = match line {
            MacdLine::Line => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{tag}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn line(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdLine::Line)
    }

    pub fn signal(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdLine::Signal)
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdLine::Histogram)
    }
}

/// Compute (line, signal, histogram) together.
pub fn macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast_ema = ewm_of_series(&closes, span_alpha(fast));
    let slow_ema = ewm_of_series(&closes, span_alpha(slow));

    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ewm_of_series(&line, span_alpha(signal));
    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| l - s)
        .collect();

    (line, signal_line, histogram)
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let (line, signal, histogram) = macd(candles, self.fast, self.slow, self.signal);
        match self.line {
            MacdLine::Line => line,
            MacdLine::Signal => signal,
            MacdLine::Histogram => histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn macd_starts_at_zero() {
        let candles = make_candles(&[100.0, 110.0]);
        let (line, signal, hist) = macd(&candles, 12, 26, 9);
        assert_approx(line[0], 0.0, DEFAULT_EPSILON);
        assert_approx(signal[0], 0.0, DEFAULT_EPSILON);
        assert_approx(hist[0], 0.0, DEFAULT_EPSILON);

        // fast = 100 + 10*2/13, slow = 100 + 10*2/27
        let expected = 10.0 * 2.0 / 13.0 - 10.0 * 2.0 / 27.0;
        assert_approx(line[1], expected, 1e-9);
        assert_approx(signal[1], expected * 0.2, 1e-9);
        assert_approx(hist[1], expected * 0.8, 1e-9);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let line = Macd::line(12, 26, 9).compute(&candles);
        let hist = Macd::histogram(12, 26, 9).compute(&candles);
        assert!(line[59] > 0.0);
        assert!(hist[30] > 0.0);
    }

    #[test]
    fn macd_flat_is_zero() {
        let candles = make_candles(&[50.0; 40]);
        let (line, signal, hist) = macd(&candles, 12, 26, 9);
        assert_approx(line[39], 0.0, DEFAULT_EPSILON);
        assert_approx(signal[39], 0.0, DEFAULT_EPSILON);
        assert_approx(hist[39], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn macd_names() {
        assert_eq!(Macd::histogram(12, 26, 9).name(), "macd_hist_12_26_9");
        assert_eq!(Macd::signal(12, 26, 9).name(), "macd_signal_12_26_9");
    }
}
