//! Regime classifier: trending vs ranging from the ADX column.
//!
//! Trending only when both the latest ADX and the mean of its last `window`
//! values exceed the threshold. Recomputed every call with no hysteresis, so a
//! borderline series may change label between calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RegimeConfig;
use crate::frame::IndicatorFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeLabel {
    Trending,
    Ranging,
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeLabel::Trending => f.write_str("trending"),
            RegimeLabel::Ranging => f.write_str("ranging"),
        }
    }
}

/// Classify the most recent candle of `frame`.
///
/// Undefined ADX values (warmup) are skipped when averaging; a NaN latest
/// value or no defined values at all is `Ranging`.
pub fn classify_regime(frame: &IndicatorFrame, config: &RegimeConfig) -> RegimeLabel {
    let adx = frame.series(&frame.columns().adx).unwrap_or(&[]);
    classify_series(adx, config)
}

pub fn classify_series(adx: &[f64], config: &RegimeConfig) -> RegimeLabel {
    let Some(&latest) = adx.last() else {
        return RegimeLabel::Ranging;
    };

    let tail = &adx[adx.len().saturating_sub(config.average_window)..];
    let defined: Vec<f64> = tail.iter().copied().filter(|v| !v.is_nan()).collect();
    if latest.is_nan() || defined.is_empty() {
        return RegimeLabel::Ranging;
    }
    let average = defined.iter().sum::<f64>() / defined.len() as f64;

    if latest > config.adx_threshold && average > config.adx_threshold {
        RegimeLabel::Trending
    } else {
        RegimeLabel::Ranging
    }
}

/// Indicator parameters better suited to a regime. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeParameters {
    pub ma_short: usize,
    pub ma_long: usize,
    pub rsi_period: usize,
    pub boll_period: usize,
}

pub fn suggested_parameters(label: RegimeLabel) -> RegimeParameters {
    match label {
        // longer windows filter out false signals
        RegimeLabel::Trending => RegimeParameters {
            ma_short: 10,
            ma_long: 30,
            rsi_period: 14,
            boll_period: 20,
        },
        RegimeLabel::Ranging => RegimeParameters {
            ma_short: 5,
            ma_long: 20,
            rsi_period: 10,
            boll_period: 14,
        },
    }
}
