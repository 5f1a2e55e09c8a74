//! Strategy pipeline: regime → scores → levels → decision.
//!
//! Each stage is a pure function of the indicator frame and its inputs.
//! `analysis::StrategyEngine` wires them together.

pub mod levels;
pub mod regime;
pub mod report;
pub mod scorer;
pub mod synthesizer;

pub use levels::{compute_levels, round2, Levels};
pub use regime::{
    classify_regime, classify_series, suggested_parameters, RegimeLabel, RegimeParameters,
};
pub use report::{format_decision, format_quote, rationale};
pub use scorer::{combine, score, votes, weights_for, ScoreVector, SignalKind};
pub use synthesizer::{
    classify_direction, strength_bucket, synthesize, Action, Direction, PositionSize,
    SignalStrength, StrategyDecision,
};
