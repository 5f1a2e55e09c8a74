//! Strategy synthesizer: decision table over the composite score.
//!
//! | score s              | direction   | stop          | take-profit   | r:r  |
//! |----------------------|-------------|---------------|---------------|------|
//! | s > 0.5              | strong up   | p - 2 ATR     | p + 3 ATR     | 1.5  |
//! | 0.2 < s <= 0.5       | mild up     | p - 1.5 ATR   | p + 2 ATR     | 1.3  |
//! | s < -0.5             | strong down | p + 2 ATR     | p - 3 ATR     | 1.5  |
//! | -0.5 <= s < -0.2     | mild down   | p + 1.5 ATR   | p - 2 ATR     | 1.3  |
//! | otherwise            | range-bound | support_1     | resistance_1  | computed |
//!
//! An undefined stop or target (ATR still in warmup) falls back to the nearest
//! level on the matching side for both buy and sell.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Levels, RegimeLabel, ScoreVector, SignalKind};
use crate::config::{DecisionConfig, WeightTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    StrongUp,
    MildUp,
    StrongDown,
    MildDown,
    RangeBound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::StrongUp => "strong up",
            Direction::MildUp => "mild up",
            Direction::StrongDown => "strong down",
            Direction::MildDown => "mild down",
            Direction::RangeBound => "range-bound",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    HoldOrRangeTrade,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::HoldOrRangeTrade => "hold / range-trade",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    Strong,
    Medium,
    Weak,
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalStrength::Strong => "strong",
            SignalStrength::Medium => "medium",
            SignalStrength::Weak => "weak",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSize {
    Heavy,
    Medium,
    Light,
}

impl fmt::Display for PositionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PositionSize::Heavy => "heavy",
            PositionSize::Medium => "medium",
            PositionSize::Light => "light",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub direction: Direction,
    pub action: Action,
    pub regime: RegimeLabel,
    pub score: f64,
    pub signal_strength: SignalStrength,
    pub confidence: f64,
    pub current_price: f64,
    pub atr: f64,
    pub support_1: f64,
    pub support_2: f64,
    pub resistance_1: f64,
    pub resistance_2: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
    pub position_size_hint: PositionSize,
    /// True when stop or target came from a level instead of ATR.
    pub level_fallback: bool,
    pub votes: BTreeMap<SignalKind, f64>,
    pub weights: BTreeMap<SignalKind, f64>,
}

/// Bucket |score| into strength, position size and confidence.
pub fn strength_bucket(score: f64, config: &DecisionConfig) -> (SignalStrength, PositionSize, f64) {
    let magnitude = score.abs();
    if magnitude > config.strong_strength {
        (SignalStrength::Strong, PositionSize::Heavy, 0.8)
    } else if magnitude > config.medium_strength {
        (SignalStrength::Medium, PositionSize::Medium, 0.6)
    } else {
        (SignalStrength::Weak, PositionSize::Light, 0.4)
    }
}

pub fn classify_direction(score: f64, config: &DecisionConfig) -> Direction {
    if score > config.strong_threshold {
        Direction::StrongUp
    } else if score > config.mild_threshold {
        Direction::MildUp
    } else if score < -config.strong_threshold {
        Direction::StrongDown
    } else if score < -config.mild_threshold {
        Direction::MildDown
    } else {
        Direction::RangeBound
    }
}

pub fn synthesize(
    scores: &ScoreVector,
    regime: RegimeLabel,
    levels: &Levels,
    current_price: f64,
    atr: f64,
    weights: &WeightTable,
    config: &DecisionConfig,
) -> StrategyDecision {
    let s = scores.score;
    let direction = classify_direction(s, config);
    let (signal_strength, position_size_hint, confidence) = strength_bucket(s, config);
    let support_1 = levels.support_1();
    let resistance_1 = levels.resistance_1();
    let p = current_price;

    let (action, stop, target, mut risk_reward) = match direction {
        Direction::StrongUp => (Action::Buy, p - 2.0 * atr, p + 3.0 * atr, 1.5),
        Direction::MildUp => (Action::Buy, p - 1.5 * atr, p + 2.0 * atr, 1.3),
        Direction::StrongDown => (Action::Sell, p + 2.0 * atr, p - 3.0 * atr, 1.5),
        Direction::MildDown => (Action::Sell, p + 1.5 * atr, p - 2.0 * atr, 1.3),
        Direction::RangeBound => (Action::HoldOrRangeTrade, support_1, resistance_1, 1.0),
    };

    if direction == Direction::RangeBound {
        let loss = p - support_1;
        if loss > 0.0 {
            risk_reward = (resistance_1 - p) / loss;
        }
    }

    // sell protects above at resistance and targets support; everything else
    // the other way round
    let (stop_level, target_level) = match action {
        Action::Sell => (resistance_1, support_1),
        Action::Buy | Action::HoldOrRangeTrade => (support_1, resistance_1),
    };
    let level_fallback = !stop.is_finite() || !target.is_finite();
    let stop_loss = if stop.is_finite() { stop } else { stop_level };
    let take_profit = if target.is_finite() { target } else { target_level };

    StrategyDecision {
        direction,
        action,
        regime,
        score: s,
        signal_strength,
        confidence,
        current_price: p,
        atr,
        support_1,
        support_2: levels.support_2(),
        resistance_1,
        resistance_2: levels.resistance_2(),
        stop_loss,
        take_profit,
        risk_reward_ratio: risk_reward,
        position_size_hint,
        level_fallback,
        votes: scores.votes.clone(),
        weights: weights.entries().into_iter().collect(),
    }
}
