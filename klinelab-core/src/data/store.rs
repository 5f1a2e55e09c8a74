//! Persisted candle series.
//!
//! Append-only: a row whose `(date, open_time)` key already exists is
//! skipped, never overwritten.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use super::DataError;
use crate::domain::{Candle, CandleKey};

pub trait CandleStore: Send + Sync {
    /// Maximum `date` in the symbol's series, `None` when empty.
    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, DataError>;

    /// Insert rows whose key is not yet present. Returns the inserted count.
    fn append(&self, symbol: &str, candles: &[Candle]) -> Result<usize, DataError>;

    /// Full series ordered by `open_time`.
    fn load(&self, symbol: &str) -> Result<Vec<Candle>, DataError>;

    fn row_count(&self, symbol: &str) -> Result<usize, DataError> {
        Ok(self.load(symbol)?.len())
    }
}

type Series = BTreeMap<CandleKey, Candle>;

/// In-process store keyed by `(date, open_time)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: Mutex<HashMap<String, Series>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Series>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Merge `incoming` into `series`, skipping existing keys and duplicates
/// within the batch itself.
pub(crate) fn merge_new(series: &mut Series, incoming: &[Candle]) -> usize {
    let mut inserted = 0;
    for candle in incoming {
        if let std::collections::btree_map::Entry::Vacant(slot) = series.entry(candle.key()) {
            slot.insert(candle.clone());
            inserted += 1;
        }
    }
    inserted
}

impl CandleStore for MemoryStore {
    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, DataError> {
        Ok(self
            .lock()
            .get(symbol)
            .and_then(|s| s.keys().next_back().map(|(date, _)| *date)))
    }

    fn append(&self, symbol: &str, candles: &[Candle]) -> Result<usize, DataError> {
        let mut guard = self.lock();
        let series = guard.entry(symbol.to_string()).or_default();
        Ok(merge_new(series, candles))
    }

    fn load(&self, symbol: &str) -> Result<Vec<Candle>, DataError> {
        let mut candles: Vec<Candle> = self
            .lock()
            .get(symbol)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }

    fn row_count(&self, symbol: &str) -> Result<usize, DataError> {
        Ok(self.lock().get(symbol).map_or(0, |s| s.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn day(n: i64) -> Candle {
        let open = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(n);
        Candle::new(
            open,
            open + Duration::days(1) - Duration::milliseconds(1),
            100.0,
            101.0,
            99.0,
            100.5,
            10.0,
        )
    }

    #[test]
    fn empty_store_has_no_latest_date() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_date("BTCUSDT").unwrap(), None);
        assert_eq!(store.row_count("BTCUSDT").unwrap(), 0);
    }

    #[test]
    fn append_skips_existing_keys() {
        let store = MemoryStore::new();
        assert_eq!(store.append("BTCUSDT", &[day(0), day(1)]).unwrap(), 2);
        let mut changed = day(1);
        changed.close = 999.0;
        assert_eq!(store.append("BTCUSDT", &[changed, day(2)]).unwrap(), 1);

        let loaded = store.load("BTCUSDT").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].close, 100.5, "existing row must not be overwritten");
        assert_eq!(
            store.latest_date("BTCUSDT").unwrap(),
            Some(day(2).date)
        );
    }

    #[test]
    fn duplicates_within_batch_insert_once() {
        let store = MemoryStore::new();
        assert_eq!(store.append("BTCUSDT", &[day(0), day(0)]).unwrap(), 1);
    }

    #[test]
    fn symbols_are_isolated() {
        let store = MemoryStore::new();
        store.append("BTCUSDT", &[day(0)]).unwrap();
        assert_eq!(store.row_count("ETHUSDT").unwrap(), 0);
    }
}
