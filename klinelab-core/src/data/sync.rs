//! Incremental kline synchronization.
//!
//! One sync walks `Unsynced → Scanning → Fetching(i)… → Normalizing →
//! Appending → Synced`. Scanning is a single `latest_date` lookup; the
//! missing range is fetched in windows of at most `window_days` days with a
//! throttle pause between windows. A failing window is recorded and skipped.
//! The store skips keys it already holds, so re-running after a partial
//! failure cannot duplicate rows.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::provider::{DataError, PriceFeed, RawKline};
use super::store::CandleStore;
use super::throttle::Throttle;
use crate::config::SyncConfig;
use crate::domain::Candle;

/// State-machine trail of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Unsynced,
    Scanning,
    /// Fetching the window with this index.
    Fetching(usize),
    Normalizing,
    Appending,
    Synced,
}

/// Result of the Scanning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncGapReport {
    pub symbol: String,
    pub latest_date: Option<NaiveDate>,
    /// Inclusive missing range, `None` when the series is current.
    pub missing: Option<(NaiveDate, NaiveDate)>,
    /// Inclusive fetch windows covering `missing`.
    pub windows: Vec<(NaiveDate, NaiveDate)>,
}

impl SyncGapReport {
    pub fn is_current(&self) -> bool {
        self.missing.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncStatus {
    AlreadyCurrent,
    Updated { inserted: usize },
    CheckFailed { reason: String },
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::AlreadyCurrent => write!(f, "data already current"),
            SyncStatus::Updated { inserted } => write!(f, "updated {inserted} records"),
            SyncStatus::CheckFailed { reason } => {
                write!(f, "sync check failed ({reason}), proceeding with stale data")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub report: Option<SyncGapReport>,
    pub phases: Vec<SyncPhase>,
    pub failed_windows: Vec<FailedWindow>,
    pub dropped_rows: usize,
}

/// Split the inclusive range `start..=end` into windows of at most `days` days.
pub fn fetch_windows(start: NaiveDate, end: NaiveDate, days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let span = Duration::days(i64::from(days.max(1)) - 1);
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let window_end = (cursor + span).min(end);
        windows.push((cursor, window_end));
        cursor = window_end + Duration::days(1);
    }
    windows
}

/// Cast one raw kline into a candle. `date` is derived from `open_time`.
pub fn parse_kline(raw: &RawKline) -> Result<Candle, DataError> {
    let num = |field: &str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| DataError::ValidationError(format!("{field} '{value}' is not numeric")))
    };
    let time = |field: &str, ms: i64| {
        DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| DataError::ValidationError(format!("{field} {ms} out of range")))
    };

    let candle = Candle::new(
        time("open_time", raw.open_time)?,
        time("close_time", raw.close_time)?,
        num("open", &raw.open)?,
        num("high", &raw.high)?,
        num("low", &raw.low)?,
        num("close", &raw.close)?,
        num("volume", &raw.volume)?,
    );
    if !candle.is_sane() {
        return Err(DataError::ValidationError(format!(
            "inconsistent kline at {}",
            candle.open_time
        )));
    }
    Ok(candle)
}

/// Normalize a batch of raw klines, dropping rows that fail to parse.
/// Returns the candles ordered by `open_time` and the dropped count.
pub fn normalize_klines(raw: &[RawKline]) -> (Vec<Candle>, usize) {
    let mut dropped = 0;
    let mut candles: Vec<Candle> = raw
        .iter()
        .filter_map(|r| match parse_kline(r) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(open_time = r.open_time, error = %e, "dropping kline row");
                dropped += 1;
                None
            }
        })
        .collect();
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.key());
    (candles, dropped)
}

pub struct SyncEngine {
    symbol: String,
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn CandleStore>,
    throttle: Arc<dyn Throttle>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        symbol: impl Into<String>,
        feed: Arc<dyn PriceFeed>,
        store: Arc<dyn CandleStore>,
        throttle: Arc<dyn Throttle>,
        config: SyncConfig,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            feed,
            store,
            throttle,
            config,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Determine the missing range up to `today`.
    pub fn scan(&self, today: NaiveDate) -> Result<SyncGapReport, DataError> {
        let latest_date = self.store.latest_date(&self.symbol)?;
        let missing = match latest_date {
            None => Some((
                today - Duration::days(i64::from(self.config.backfill_days)),
                today,
            )),
            Some(latest) if latest < today => Some((latest + Duration::days(1), today)),
            Some(_) => None,
        };
        let windows = missing
            .map(|(start, end)| fetch_windows(start, end, self.config.window_days))
            .unwrap_or_default();

        Ok(SyncGapReport {
            symbol: self.symbol.clone(),
            latest_date,
            missing,
            windows,
        })
    }

    /// Bring the persisted series up to `today`. Never fails: problems are
    /// reported through `SyncStatus::CheckFailed` and `failed_windows`.
    pub fn sync_until(&self, today: NaiveDate) -> SyncOutcome {
        let mut outcome = SyncOutcome {
            status: SyncStatus::AlreadyCurrent,
            report: None,
            phases: vec![SyncPhase::Unsynced, SyncPhase::Scanning],
            failed_windows: Vec::new(),
            dropped_rows: 0,
        };

        let report = match self.scan(today) {
            Ok(report) => report,
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "sync scan failed");
                outcome.status = SyncStatus::CheckFailed {
                    reason: e.to_string(),
                };
                return outcome;
            }
        };

        if report.is_current() {
            debug!(symbol = %self.symbol, "series already current");
            outcome.phases.push(SyncPhase::Synced);
            outcome.report = Some(report);
            return outcome;
        }

        info!(
            symbol = %self.symbol,
            latest = ?report.latest_date,
            windows = report.windows.len(),
            "syncing missing klines"
        );

        let mut raw = Vec::new();
        for (i, &(start, end)) in report.windows.iter().enumerate() {
            if i > 0 {
                self.throttle.pause();
            }
            outcome.phases.push(SyncPhase::Fetching(i));
            match self
                .feed
                .klines(&self.symbol, self.config.interval, start, end)
            {
                Ok(rows) => {
                    debug!(%start, %end, rows = rows.len(), "window fetched");
                    raw.extend(rows);
                }
                Err(e) => {
                    warn!(symbol = %self.symbol, %start, %end, error = %e, "fetch window failed");
                    outcome.failed_windows.push(FailedWindow {
                        start,
                        end,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome.phases.push(SyncPhase::Normalizing);
        let (candles, dropped) = normalize_klines(&raw);
        outcome.dropped_rows = dropped;

        outcome.phases.push(SyncPhase::Appending);
        let all_failed = outcome.failed_windows.len() == report.windows.len();
        outcome.status = match self.store.append(&self.symbol, &candles) {
            Ok(0) if all_failed => SyncStatus::CheckFailed {
                reason: format!(
                    "all {} fetch windows failed: {}",
                    report.windows.len(),
                    outcome
                        .failed_windows
                        .first()
                        .map(|w| w.error.as_str())
                        .unwrap_or_default()
                ),
            },
            Ok(0) if outcome.failed_windows.is_empty() => {
                debug!(symbol = %self.symbol, "upstream has nothing newer than the store");
                SyncStatus::AlreadyCurrent
            }
            Ok(inserted) => {
                info!(symbol = %self.symbol, inserted, "klines appended");
                SyncStatus::Updated { inserted }
            }
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "append failed");
                SyncStatus::CheckFailed {
                    reason: e.to_string(),
                }
            }
        };

        outcome.phases.push(SyncPhase::Synced);
        outcome.report = Some(report);
        outcome
    }

    /// Sync up to the current UTC date.
    pub fn sync(&self) -> SyncOutcome {
        self.sync_until(Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(open_time: i64, close: &str) -> RawKline {
        RawKline {
            open_time,
            open: close.to_string(),
            high: "110".to_string(),
            low: "90".to_string(),
            close: close.to_string(),
            volume: "5.5".to_string(),
            close_time: open_time + 86_399_999,
        }
    }

    #[test]
    fn windows_cover_range_in_weeks() {
        let w = fetch_windows(date(2024, 1, 1), date(2024, 1, 31), 7);
        assert_eq!(w.len(), 5);
        assert_eq!(w[0], (date(2024, 1, 1), date(2024, 1, 7)));
        assert_eq!(w[4], (date(2024, 1, 29), date(2024, 1, 31)));
    }

    #[test]
    fn single_day_range_is_one_window() {
        let w = fetch_windows(date(2024, 1, 5), date(2024, 1, 5), 7);
        assert_eq!(w, vec![(date(2024, 1, 5), date(2024, 1, 5))]);
        assert!(fetch_windows(date(2024, 1, 6), date(2024, 1, 5), 7).is_empty());
    }

    #[test]
    fn parse_derives_date_from_open_time() {
        let c = parse_kline(&raw(1_704_067_200_000, "100.5")).unwrap();
        assert_eq!(c.date, date(2024, 1, 1));
        assert_eq!(c.close, 100.5);
        assert_eq!(c.volume, 5.5);
    }

    #[test]
    fn normalize_drops_bad_rows_and_sorts() {
        let day = 86_400_000;
        let rows = vec![
            raw(1_704_067_200_000 + day, "101"),
            raw(1_704_067_200_000, "100"),
            raw(1_704_067_200_000 + 2 * day, "abc"),
            raw(1_704_067_200_000, "100"),
        ];
        let (candles, dropped) = normalize_klines(&rows);
        assert_eq!(dropped, 1);
        assert_eq!(candles.len(), 2);
        assert!(candles[0].open_time < candles[1].open_time);
    }

    #[test]
    fn inconsistent_row_is_dropped() {
        let mut bad = raw(1_704_067_200_000, "100");
        bad.high = "50".to_string();
        assert!(matches!(parse_kline(&bad), Err(DataError::ValidationError(_))));
    }

    #[test]
    fn status_messages() {
        assert_eq!(SyncStatus::AlreadyCurrent.to_string(), "data already current");
        assert_eq!(
            SyncStatus::Updated { inserted: 14 }.to_string(),
            "updated 14 records"
        );
        assert!(SyncStatus::CheckFailed {
            reason: "timeout".into()
        }
        .to_string()
        .contains("proceeding with stale data"));
    }
}
