//! Indicator frame: a candle series plus every derived column.
//!
//! Built once per request from a read-only snapshot of the series and never
//! persisted. Columns are stored under the indicator's own name (`sma_20`,
//! `kdj_k_9`, ...); `FrameColumns` remembers which name plays which role so
//! downstream stages read typed rows instead of string keys.

use std::collections::{BTreeMap, HashSet};

use crate::config::IndicatorConfig;
use crate::domain::Candle;
use crate::indicators::{
    Adx, Atr, Bollinger, Indicator, IndicatorValues, Kdj, Macd, Obv, ParabolicSar, Rsi, Sma,
};

/// Column names for each role in the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameColumns {
    pub ma: BTreeMap<usize, String>,
    pub rsi: String,
    pub kdj_k: String,
    pub kdj_d: String,
    pub kdj_j: String,
    pub macd_line: String,
    pub macd_signal: String,
    pub macd_hist: String,
    pub boll_upper: String,
    pub boll_middle: String,
    pub boll_lower: String,
    pub sar: String,
    pub adx: String,
    pub atr: String,
    pub volume_short: String,
    pub volume_long: String,
    pub obv: String,
}

/// Snapshot of every column at one candle index.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub index: usize,
    pub close: f64,
    pub volume: f64,
    pub ma: BTreeMap<usize, f64>,
    pub rsi: f64,
    pub kdj_k: f64,
    pub kdj_d: f64,
    pub kdj_j: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub boll_upper: f64,
    pub boll_middle: f64,
    pub boll_lower: f64,
    pub sar: f64,
    pub adx: f64,
    pub atr: f64,
    pub volume_short: f64,
    pub volume_long: f64,
    pub obv: f64,
}

impl FrameRow {
    /// MA value for a window; NaN when the window was not computed.
    pub fn ma(&self, window: usize) -> f64 {
        self.ma.get(&window).copied().unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    candles: Vec<Candle>,
    values: IndicatorValues,
    columns: FrameColumns,
}

impl IndicatorFrame {
    /// Compute every configured indicator over `candles`.
    pub fn compute(candles: Vec<Candle>, config: &IndicatorConfig) -> Self {
        let (indicators, columns) = build_indicators(config);

        let mut values = IndicatorValues::new();
        for indicator in &indicators {
            let series = indicator.compute(&candles);
            debug_assert_eq!(
                series.len(),
                candles.len(),
                "indicator '{}' produced {} values for {} candles",
                indicator.name(),
                series.len(),
                candles.len()
            );
            values.insert(indicator.name(), series);
        }

        Self {
            candles,
            values,
            columns,
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn columns(&self) -> &FrameColumns {
        &self.columns
    }

    pub fn values(&self) -> &IndicatorValues {
        &self.values
    }

    /// Full series of a named column.
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.values.get_series(name)
    }

    fn value(&self, name: &str, index: usize) -> f64 {
        self.values.get(name, index).unwrap_or(f64::NAN)
    }

    /// Typed snapshot at `index`, or `None` past the end.
    pub fn row(&self, index: usize) -> Option<FrameRow> {
        let candle = self.candles.get(index)?;
        let c = &self.columns;
        Some(FrameRow {
            index,
            close: candle.close,
            volume: candle.volume,
            ma: c
                .ma
                .iter()
                .map(|(&window, name)| (window, self.value(name, index)))
                .collect(),
            rsi: self.value(&c.rsi, index),
            kdj_k: self.value(&c.kdj_k, index),
            kdj_d: self.value(&c.kdj_d, index),
            kdj_j: self.value(&c.kdj_j, index),
            macd_line: self.value(&c.macd_line, index),
            macd_signal: self.value(&c.macd_signal, index),
            macd_hist: self.value(&c.macd_hist, index),
            boll_upper: self.value(&c.boll_upper, index),
            boll_middle: self.value(&c.boll_middle, index),
            boll_lower: self.value(&c.boll_lower, index),
            sar: self.value(&c.sar, index),
            adx: self.value(&c.adx, index),
            atr: self.value(&c.atr, index),
            volume_short: self.value(&c.volume_short, index),
            volume_long: self.value(&c.volume_long, index),
            obv: self.value(&c.obv, index),
        })
    }

    /// Snapshot of the most recent candle.
    pub fn latest(&self) -> Option<FrameRow> {
        self.candles.len().checked_sub(1).and_then(|i| self.row(i))
    }
}

fn build_indicators(config: &IndicatorConfig) -> (Vec<Box<dyn Indicator>>, FrameColumns) {
    let mut seen = HashSet::new();
    let mut indicators: Vec<Box<dyn Indicator>> = Vec::new();

    let mut add = |ind: Box<dyn Indicator>| -> String {
        let key = ind.name().to_string();
        if seen.insert(key.clone()) {
            indicators.push(ind);
        }
        key
    };

    let ma = config
        .ma_windows
        .iter()
        .map(|&w| (w, add(Box::new(Sma::new(w)))))
        .collect();

    let (fast, slow, signal) = (config.macd_fast, config.macd_slow, config.macd_signal);
    let (period, mult) = (config.boll_period, config.boll_multiplier);
    let sar = config.sar;

    let columns = FrameColumns {
        ma,
        rsi: add(Box::new(Rsi::new(config.rsi_period))),
        kdj_k: add(Box::new(Kdj::k(config.kdj_period))),
        kdj_d: add(Box::new(Kdj::d(config.kdj_period))),
        kdj_j: add(Box::new(Kdj::j(config.kdj_period))),
        macd_line: add(Box::new(Macd::line(fast, slow, signal))),
        macd_signal: add(Box::new(Macd::signal(fast, slow, signal))),
        macd_hist: add(Box::new(Macd::histogram(fast, slow, signal))),
        boll_upper: add(Box::new(Bollinger::upper(period, mult))),
        boll_middle: add(Box::new(Bollinger::middle(period, mult))),
        boll_lower: add(Box::new(Bollinger::lower(period, mult))),
        sar: add(Box::new(ParabolicSar::new(
            sar.af_start,
            sar.af_step,
            sar.af_max,
        ))),
        adx: add(Box::new(Adx::new(config.adx_period))),
        atr: add(Box::new(Atr::new(config.atr_period))),
        volume_short: add(Box::new(Sma::of_volume(config.volume_short))),
        volume_long: add(Box::new(Sma::of_volume(config.volume_long))),
        obv: add(Box::new(Obv::new())),
    };

    (indicators, columns)
}
