//! Parquet-backed candle store with Hive-style partitioning.
//!
//! Layout: `{dir}/symbol={SYMBOL}/{year}.parquet`
//!
//! - Append merges into the affected year partitions; existing keys win.
//! - Atomic writes (write to .tmp, rename into place).
//! - Unreadable partitions are quarantined as `{year}.parquet.quarantined`.
//! - `meta.json` sidecar per symbol (date range, row count, blake3 hash),
//!   rewritten whenever a quarantine drops rows. The high-water date is
//!   always taken from the readable partitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{merge_new, CandleStore};
use super::DataError;
use crate::domain::{Candle, CandleKey};

const COLUMNS: [&str; 8] = [
    "date",
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
];

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub written_at: DateTime<Utc>,
}

pub struct ParquetStore {
    dir: PathBuf,
    // Serializes partition reads, quarantines and the read-merge-write
    // cycle of `append`.
    write_lock: Mutex<()>,
}

impl ParquetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("symbol={symbol}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    pub fn get_meta(&self, symbol: &str) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Read every valid partition. Corrupt ones are quarantined and skipped;
    /// the returned flag is set when that happened.
    fn read_series(&self, symbol: &str) -> Result<(BTreeMap<CandleKey, Candle>, bool), DataError> {
        let mut series = BTreeMap::new();
        let mut quarantined = false;
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Ok((series, quarantined));
        }

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| DataError::StoreError(format!("read dir: {e}")))?;
        for entry in entries {
            let path = entry
                .map_err(|e| DataError::StoreError(format!("dir entry: {e}")))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            match load_and_validate_parquet(&path) {
                Ok(candles) => {
                    for c in candles {
                        let key = c.key();
                        if series.insert(key, c).is_some() {
                            return Err(DataError::DuplicateKey(format!(
                                "{symbol} {} at {} appears twice in {}",
                                key.0,
                                key.1,
                                sym_dir.display()
                            )));
                        }
                    }
                }
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    warn!(path = %path.display(), error = %e, "quarantining corrupt partition");
                    fs::rename(&path, &quarantine).map_err(|err| {
                        DataError::StoreError(format!(
                            "failed to quarantine {}: {err}",
                            path.display()
                        ))
                    })?;
                    quarantined = true;
                }
            }
        }
        Ok((series, quarantined))
    }

    /// Bring `meta.json` in line with what survived a quarantine.
    fn refresh_meta(&self, symbol: &str, series: &BTreeMap<CandleKey, Candle>) -> Result<(), DataError> {
        if series.is_empty() {
            return match fs::remove_file(self.meta_path(symbol)) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    Err(DataError::StoreError(format!("meta remove: {e}")))
                }
                _ => Ok(()),
            };
        }
        self.write_meta(symbol, series)
    }

    fn write_meta(&self, symbol: &str, series: &BTreeMap<CandleKey, Candle>) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (series.keys().next(), series.keys().next_back()) else {
            return Ok(());
        };
        let rows: Vec<&Candle> = series.values().collect();
        let bytes = serde_json::to_vec(&rows)
            .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?;
        let meta = StoreMeta {
            symbol: symbol.to_string(),
            start_date: first.0,
            end_date: last.0,
            row_count: series.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            written_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))
    }
}

impl CandleStore for ParquetStore {
    /// Derived from the partitions that read cleanly, so a quarantined
    /// partition reopens its days for the next sync.
    fn latest_date(&self, symbol: &str) -> Result<Option<NaiveDate>, DataError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (series, quarantined) = self.read_series(symbol)?;
        if quarantined {
            self.refresh_meta(symbol, &series)?;
        }
        Ok(series.keys().next_back().map(|(d, _)| *d))
    }

    fn append(&self, symbol: &str, candles: &[Candle]) -> Result<usize, DataError> {
        if candles.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut series, quarantined) = self.read_series(symbol)?;
        let inserted = merge_new(&mut series, candles);
        if inserted == 0 {
            if quarantined {
                self.refresh_meta(symbol, &series)?;
            }
            return Ok(0);
        }

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let touched: BTreeSet<i32> = candles.iter().map(|c| c.date.year()).collect();
        for year in touched {
            let rows: Vec<&Candle> = series.values().filter(|c| c.date.year() == year).collect();
            let df = candles_to_dataframe(&rows)?;
            let path = self.year_path(symbol, year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::StoreError(format!("atomic rename failed: {e}"))
            })?;
            debug!(symbol, year, rows = rows.len(), "partition written");
        }

        self.write_meta(symbol, &series)?;
        Ok(inserted)
    }

    fn load(&self, symbol: &str) -> Result<Vec<Candle>, DataError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (series, quarantined) = self.read_series(symbol)?;
        if quarantined {
            self.refresh_meta(symbol, &series)?;
        }
        let mut candles: Vec<Candle> = series.into_values().collect();
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    // NaiveDate's default is 1970-01-01.
    NaiveDate::default()
}

fn candles_to_dataframe(candles: &[&Candle]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = candles
        .iter()
        .map(|c| (c.date - epoch()).num_days() as i32)
        .collect();
    let open_times: Vec<i64> = candles.iter().map(|c| c.open_time.timestamp_millis()).collect();
    let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let close_times: Vec<i64> = candles.iter().map(|c| c.close_time.timestamp_millis()).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open_time".into(), open_times),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("close_time".into(), close_times),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Candle>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in &COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_candles(&df)
}

fn dataframe_to_candles(df: &DataFrame) -> Result<Vec<Candle>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let date_ca = col("date")?.date().map_err(|e| type_err("date", e))?;
    let open_time_ca = col("open_time")?.i64().map_err(|e| type_err("open_time", e))?;
    let close_time_ca = col("close_time")?.i64().map_err(|e| type_err("close_time", e))?;
    let open_ca = col("open")?.f64().map_err(|e| type_err("open", e))?;
    let high_ca = col("high")?.f64().map_err(|e| type_err("high", e))?;
    let low_ca = col("low")?.f64().map_err(|e| type_err("low", e))?;
    let close_ca = col("close")?.f64().map_err(|e| type_err("close", e))?;
    let vol_ca = col("volume")?.f64().map_err(|e| type_err("volume", e))?;

    let to_time = |ms: Option<i64>, what: &str, i: usize| {
        ms.and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| DataError::ParquetError(format!("invalid {what} at row {i}")))
    };

    let n = df.height();
    let mut candles = Vec::with_capacity(n);
    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        candles.push(Candle {
            date: epoch() + chrono::Duration::days(days as i64),
            open_time: to_time(open_time_ca.get(i), "open_time", i)?,
            close_time: to_time(close_time_ca.get(i), "close_time", i)?,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(f64::NAN),
        });
    }
    Ok(candles)
}
