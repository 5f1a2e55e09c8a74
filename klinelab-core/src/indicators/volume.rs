//! On-balance volume (OBV).
//!
//! Running sum starting at 0: add the candle's volume when close rises, subtract
//! it when close falls, carry forward when close is flat.
//! Lookback: 0.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObvState {
    pub value: f64,
    pub prev_close: Option<f64>,
}

impl ObvState {
    pub fn step(self, candle: &Candle) -> (ObvState, f64) {
        let value = match self.prev_close {
            Some(prev) if candle.close > prev => self.value + candle.volume,
            Some(prev) if candle.close < prev => self.value - candle.volume,
            _ => self.value,
        };
        let next = ObvState {
            value,
            prev_close: Some(candle.close),
        };
        (next, value)
    }
}

#[derive(Debug, Clone)]
pub struct Obv {
    name: String,
}

impl Obv {
    pub fn new() -> Self {
        Self {
            name: "obv".to_string(),
        }
    }
}

impl Default for Obv {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut state = ObvState::default();
        candles
            .iter()
            .map(|c| {
                let (next, value) = state.step(c);
                state = next;
                value
            })
            .collect()
    }
}
