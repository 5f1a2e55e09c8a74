//! Analysis configuration.
//!
//! One serde struct tree loaded from TOML. Every field defaults to the
//! built-in constants, so an empty file (or no file) is a complete config.
//! Weight tables are fixed configuration, validated on load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Interval;
use crate::indicators::SarParams;
use crate::strategy::SignalKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KlineLabConfig {
    pub indicators: IndicatorConfig,
    pub regime: RegimeConfig,
    pub scoring: ScoringConfig,
    pub levels: LevelConfig,
    pub decision: DecisionConfig,
    pub sync: SyncConfig,
    pub feed: FeedConfig,
    pub forecast: ForecastConfig,
}

impl KlineLabConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.trending_weights.validate("trending")?;
        self.scoring.ranging_weights.validate("ranging")?;

        for window in self.scoring.ma_order {
            if !self.indicators.ma_windows.contains(&window) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.ma_order uses MA window {window} which is not in indicators.ma_windows"
                )));
            }
        }
        if self.indicators.ma_windows.contains(&0) {
            return Err(ConfigError::Invalid("MA windows must be >= 1".into()));
        }
        self.indicators.validate()?;
        for (name, value) in [
            ("regime.average_window", self.regime.average_window),
            ("scoring.obv_slope_window", self.scoring.obv_slope_window),
            ("levels.lookback", self.levels.lookback),
            ("levels.ma_short", self.levels.ma_short),
            ("levels.ma_long", self.levels.ma_long),
        ] {
            require_period(name, value)?;
        }
        if self.decision.mild_threshold >= self.decision.strong_threshold {
            return Err(ConfigError::Invalid(
                "decision.mild_threshold must be below decision.strong_threshold".into(),
            ));
        }
        if self.sync.window_days == 0 {
            return Err(ConfigError::Invalid("sync.window_days must be >= 1".into()));
        }
        if self.feed.history_limit == 0 || self.feed.history_limit > 1000 {
            return Err(ConfigError::Invalid(
                "feed.history_limit must be within 1..=1000".into(),
            ));
        }
        Ok(())
    }
}

fn require_period(name: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be >= 1")));
    }
    Ok(())
}

/// Windows, periods and multipliers of the indicator library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ma_windows: Vec<usize>,
    pub rsi_period: usize,
    pub kdj_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub boll_period: usize,
    pub boll_multiplier: f64,
    pub sar: SarParams,
    pub adx_period: usize,
    pub atr_period: usize,
    pub volume_short: usize,
    pub volume_long: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 10, 20, 60],
            rsi_period: 14,
            kdj_period: 9,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            boll_period: 20,
            boll_multiplier: 2.0,
            sar: SarParams::default(),
            adx_period: 14,
            atr_period: 14,
            volume_short: 5,
            volume_long: 10,
        }
    }
}

impl IndicatorConfig {
    /// Reject the parameters the indicator constructors cannot accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("indicators.rsi_period", self.rsi_period),
            ("indicators.kdj_period", self.kdj_period),
            ("indicators.macd_fast", self.macd_fast),
            ("indicators.macd_slow", self.macd_slow),
            ("indicators.macd_signal", self.macd_signal),
            ("indicators.boll_period", self.boll_period),
            ("indicators.adx_period", self.adx_period),
            ("indicators.atr_period", self.atr_period),
            ("indicators.volume_short", self.volume_short),
            ("indicators.volume_long", self.volume_long),
        ] {
            require_period(name, value)?;
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::Invalid(
                "indicators.macd_fast must be shorter than indicators.macd_slow".into(),
            ));
        }
        if !self.boll_multiplier.is_finite() || self.boll_multiplier < 0.0 {
            return Err(ConfigError::Invalid(
                "indicators.boll_multiplier must be a non-negative number".into(),
            ));
        }

        let sar = &self.sar;
        if sar.af_start.is_nan() || sar.af_start <= 0.0 {
            return Err(ConfigError::Invalid("indicators.sar.af_start must be > 0".into()));
        }
        if sar.af_step.is_nan() || sar.af_step <= 0.0 {
            return Err(ConfigError::Invalid("indicators.sar.af_step must be > 0".into()));
        }
        if !sar.af_max.is_finite() || sar.af_max < sar.af_start {
            return Err(ConfigError::Invalid(
                "indicators.sar.af_max must be >= indicators.sar.af_start".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub adx_threshold: f64,
    pub average_window: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            adx_threshold: 25.0,
            average_window: 20,
        }
    }
}

/// Per-indicator weights for one regime. A zero weight leaves the indicator
/// out of the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub ma: f64,
    pub macd: f64,
    pub sar: f64,
    pub boll: f64,
    pub rsi: f64,
    pub kdj: f64,
    pub vol: f64,
}

impl WeightTable {
    pub fn trending() -> Self {
        Self {
            ma: 0.25,
            macd: 0.20,
            sar: 0.15,
            boll: 0.20,
            rsi: 0.10,
            kdj: 0.10,
            vol: 0.0,
        }
    }

    pub fn ranging() -> Self {
        Self {
            ma: 0.10,
            macd: 0.0,
            sar: 0.0,
            boll: 0.25,
            rsi: 0.30,
            kdj: 0.20,
            vol: 0.15,
        }
    }

    pub fn weight(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Ma => self.ma,
            SignalKind::Macd => self.macd,
            SignalKind::Sar => self.sar,
            SignalKind::Boll => self.boll,
            SignalKind::Rsi => self.rsi,
            SignalKind::Kdj => self.kdj,
            SignalKind::Vol => self.vol,
        }
    }

    /// Indicators with a non-zero weight, in display order.
    pub fn entries(&self) -> Vec<(SignalKind, f64)> {
        SignalKind::ALL
            .iter()
            .map(|&kind| (kind, self.weight(kind)))
            .filter(|&(_, w)| w != 0.0)
            .collect()
    }

    pub fn total(&self) -> f64 {
        SignalKind::ALL.iter().map(|&k| self.weight(k)).sum()
    }

    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if SignalKind::ALL.iter().any(|&k| self.weight(k) < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{label} weight table has a negative weight"
            )));
        }
        let total = self.total();
        if (total - 1.0).abs() > 1e-9 {
            return Err(ConfigError::Invalid(format!(
                "{label} weight table sums to {total}, expected 1.0"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub trending_weights: WeightTable,
    pub ranging_weights: WeightTable,
    /// Fast, medium and slow MA windows compared by the ordering vote.
    pub ma_order: [usize; 3],
    pub volume_surge_ratio: f64,
    pub volume_boost: f64,
    /// Candles back for the OBV slope used by the volume vote.
    pub obv_slope_window: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub kdj_low: f64,
    pub kdj_high: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            trending_weights: WeightTable::trending(),
            ranging_weights: WeightTable::ranging(),
            ma_order: [5, 10, 20],
            volume_surge_ratio: 1.2,
            volume_boost: 0.5,
            obv_slope_window: 5,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            kdj_low: 20.0,
            kdj_high: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub lookback: usize,
    pub ma_short: usize,
    pub ma_long: usize,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            ma_short: 20,
            ma_long: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub mild_threshold: f64,
    pub strong_threshold: f64,
    pub medium_strength: f64,
    pub strong_strength: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            mild_threshold: 0.2,
            strong_threshold: 0.5,
            medium_strength: 0.3,
            strong_strength: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval: Interval,
    pub window_days: u32,
    pub backfill_days: u32,
    pub throttle_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneDay,
            window_days: 7,
            backfill_days: 30,
            throttle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub history_interval: Interval,
    pub history_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            timeout_secs: 10,
            max_retries: 3,
            history_interval: Interval::OneHour,
            history_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub ar_order: usize,
    pub min_history: usize,
    pub default_horizon: usize,
    pub band: f64,
    pub fallback_ma_window: usize,
    pub master_seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            ar_order: 5,
            min_history: 30,
            default_horizon: 7,
            band: 0.05,
            fallback_ma_window: 7,
            master_seed: 42,
        }
    }
}
