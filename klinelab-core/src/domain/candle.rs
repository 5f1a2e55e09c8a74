//! Candle, the fundamental market data unit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Persisted primary key of a candle: `(date, open_time)`.
pub type CandleKey = (NaiveDate, DateTime<Utc>);

/// OHLCV candle for a single symbol and bar interval.
///
/// `date` is derived from `open_time` (UTC calendar day) and together with
/// `open_time` forms the persisted primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Build a candle, deriving `date` from `open_time`.
    pub fn new(
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            date: open_time.date_naive(),
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn key(&self) -> CandleKey {
        (self.date, self.open_time)
    }

    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic sanity check: time ordering, high >= low, open/close inside the range.
    pub fn is_sane(&self) -> bool {
        if self.is_void() || self.open_time >= self.close_time {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}

/// Check the series invariants: `open_time` strictly increasing, no duplicate keys.
pub fn is_strictly_ordered(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].open_time < w[1].open_time)
}
