//! Signal scorer: per-indicator votes and the regime-weighted composite.
//!
//! Every vote is -1, 0 or +1. An undefined input (warmup NaN) votes 0. The
//! composite is the weighted vote sum over the regime's table plus a volume
//! confirmation boost of `volume_boost * sign(composite)` when volume surges.
//! The boost is not clipped, so |score| can reach 1 + volume_boost.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::RegimeLabel;
use crate::config::{ScoringConfig, WeightTable};
use crate::frame::{FrameRow, IndicatorFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    #[serde(rename = "MA")]
    Ma,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "SAR")]
    Sar,
    #[serde(rename = "BOLL")]
    Boll,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "KDJ")]
    Kdj,
    #[serde(rename = "VOL")]
    Vol,
}

impl SignalKind {
    pub const ALL: [SignalKind; 7] = [
        SignalKind::Ma,
        SignalKind::Macd,
        SignalKind::Sar,
        SignalKind::Boll,
        SignalKind::Rsi,
        SignalKind::Kdj,
        SignalKind::Vol,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Ma => "MA",
            SignalKind::Macd => "MACD",
            SignalKind::Sar => "SAR",
            SignalKind::Boll => "BOLL",
            SignalKind::Rsi => "RSI",
            SignalKind::Kdj => "KDJ",
            SignalKind::Vol => "VOL",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Votes plus the composite derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreVector {
    pub votes: BTreeMap<SignalKind, f64>,
    /// Weighted vote sum before the volume boost.
    pub weighted: f64,
    pub volume_boost: f64,
    pub score: f64,
}

impl ScoreVector {
    pub fn vote(&self, kind: SignalKind) -> f64 {
        self.votes.get(&kind).copied().unwrap_or(0.0)
    }
}

/// Weight table for a regime.
pub fn weights_for(regime: RegimeLabel, config: &ScoringConfig) -> WeightTable {
    match regime {
        RegimeLabel::Trending => config.trending_weights,
        RegimeLabel::Ranging => config.ranging_weights,
    }
}

/// Score the most recent row of `frame` against `current_price`.
pub fn score(
    frame: &IndicatorFrame,
    current_price: f64,
    regime: RegimeLabel,
    config: &ScoringConfig,
) -> ScoreVector {
    let Some(row) = frame.latest() else {
        return combine(BTreeMap::new(), false, regime, config);
    };

    let obv = frame.series(&frame.columns().obv).unwrap_or(&[]);
    let votes = votes(&row, obv, current_price, config);
    let surge = row.volume_long.is_finite()
        && row.volume > config.volume_surge_ratio * row.volume_long;

    combine(votes, surge, regime, config)
}

/// Per-indicator votes for one row.
pub fn votes(
    row: &FrameRow,
    obv: &[f64],
    current_price: f64,
    config: &ScoringConfig,
) -> BTreeMap<SignalKind, f64> {
    let mut votes = BTreeMap::new();

    let macd = if row.macd_line > row.macd_signal && row.macd_hist > 0.0 {
        1.0
    } else if row.macd_line < row.macd_signal && row.macd_hist < 0.0 {
        -1.0
    } else {
        0.0
    };
    votes.insert(SignalKind::Macd, macd);

    let rsi = if row.rsi < config.rsi_oversold {
        1.0 // oversold
    } else if row.rsi > config.rsi_overbought {
        -1.0
    } else {
        0.0
    };
    votes.insert(SignalKind::Rsi, rsi);

    let kdj = if row.kdj_k > row.kdj_d && row.kdj_k < config.kdj_high {
        1.0
    } else if row.kdj_k < row.kdj_d && row.kdj_k > config.kdj_low {
        -1.0
    } else {
        0.0
    };
    votes.insert(SignalKind::Kdj, kdj);

    let [fast, mid, slow] = config.ma_order.map(|w| row.ma(w));
    let ma = if fast > mid && mid > slow {
        1.0
    } else if fast < mid && mid < slow {
        -1.0
    } else {
        0.0
    };
    votes.insert(SignalKind::Ma, ma);

    let boll = if current_price < row.boll_lower {
        1.0 // oversold bounce
    } else if current_price > row.boll_upper {
        -1.0
    } else {
        0.0
    };
    votes.insert(SignalKind::Boll, boll);

    let sar = if row.sar.is_nan() {
        0.0
    } else if current_price > row.sar {
        1.0
    } else {
        -1.0
    };
    votes.insert(SignalKind::Sar, sar);

    votes.insert(SignalKind::Vol, volume_vote(row, obv, config.obv_slope_window));

    votes
}

/// Volume vote: OBV direction over the slope window, only while short-term
/// volume runs above the long-term average.
fn volume_vote(row: &FrameRow, obv: &[f64], window: usize) -> f64 {
    let volume_rising = row.volume_short > row.volume_long;
    if !volume_rising || window == 0 || row.index < window {
        return 0.0;
    }
    let (Some(&now), Some(&then)) = (obv.get(row.index), obv.get(row.index - window)) else {
        return 0.0;
    };
    let slope = now - then;
    if slope > 0.0 {
        1.0
    } else if slope < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Combine votes into the composite for a regime.
pub fn combine(
    votes: BTreeMap<SignalKind, f64>,
    volume_surge: bool,
    regime: RegimeLabel,
    config: &ScoringConfig,
) -> ScoreVector {
    let table = weights_for(regime, config);
    let weighted: f64 = table
        .entries()
        .iter()
        .map(|&(kind, weight)| votes.get(&kind).copied().unwrap_or(0.0) * weight)
        .sum();

    let volume_boost = if volume_surge && weighted != 0.0 {
        config.volume_boost * weighted.signum()
    } else {
        0.0
    };

    ScoreVector {
        votes,
        weighted,
        volume_boost,
        score: weighted + volume_boost,
    }
}
