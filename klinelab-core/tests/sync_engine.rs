//! Sync engine scenarios against a scripted feed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, NaiveTime};
use klinelab_core::config::SyncConfig;
use klinelab_core::data::{
    CandleStore, DataError, MemoryStore, NoDelay, ParquetStore, PriceFeed, RawKline, SyncEngine,
    SyncPhase, SyncStatus,
};
use klinelab_core::domain::{Candle, Interval, OrderBookTop, Ticker};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 3, 31)
}

fn daily_kline(day: NaiveDate) -> RawKline {
    let open = day.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let close = 100.0 + (day - date(2024, 1, 1)).num_days() as f64;
    RawKline {
        open_time: open,
        open: format!("{}", close - 0.5),
        high: format!("{}", close + 2.0),
        low: format!("{}", close - 2.0),
        close: format!("{close}"),
        volume: "12.5".to_string(),
        close_time: open + 86_399_999,
    }
}

/// Serves one daily kline per requested day. Windows starting on a date in
/// `fail_starts` return an upstream error. `overlap` adds the day before
/// each window to the response. Nothing after `available_until` is served.
#[derive(Default)]
struct ScriptedFeed {
    fail_starts: HashSet<NaiveDate>,
    overlap: bool,
    available_until: Option<NaiveDate>,
    requests: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl ScriptedFeed {
    fn requests(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PriceFeed for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    fn ticker(&self, _symbol: &str) -> Result<Ticker, DataError> {
        Err(DataError::Other("not scripted".into()))
    }

    fn order_book_top(&self, _symbol: &str) -> Result<OrderBookTop, DataError> {
        Ok(OrderBookTop::default())
    }

    fn klines(
        &self,
        _symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawKline>, DataError> {
        assert_eq!(interval, Interval::OneDay);
        self.requests.lock().unwrap().push((start, end));
        if self.fail_starts.contains(&start) {
            return Err(DataError::NetworkUnreachable("connection reset".into()));
        }
        let first = if self.overlap {
            start - Duration::days(1)
        } else {
            start
        };
        let last = self.available_until.map_or(end, |cap| cap.min(end));
        Ok(first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(daily_kline)
            .collect())
    }

    fn recent_klines(
        &self,
        _symbol: &str,
        _interval: Interval,
        _limit: usize,
    ) -> Result<Vec<RawKline>, DataError> {
        Ok(Vec::new())
    }
}

fn engine(
    feed: Arc<ScriptedFeed>,
    store: Arc<dyn CandleStore>,
    throttle: Arc<NoDelay>,
) -> SyncEngine {
    SyncEngine::new("BTCUSDT", feed, store, throttle, SyncConfig::default())
}

fn seed_store(store: &dyn CandleStore, through: NaiveDate) {
    let (candles, _) = klinelab_core::data::normalize_klines(&[daily_kline(through)]);
    store.append("BTCUSDT", &candles).unwrap();
}

#[test]
fn empty_store_backfills_thirty_days() {
    let feed = Arc::new(ScriptedFeed::default());
    let store = Arc::new(MemoryStore::new());
    let throttle = Arc::new(NoDelay::new());
    let sync = engine(feed.clone(), store.clone(), throttle.clone());

    let report = sync.scan(today()).unwrap();
    assert_eq!(report.missing, Some((date(2024, 3, 1), today())));
    assert_eq!(report.windows.len(), 5);

    let outcome = sync.sync_until(today());
    assert_eq!(outcome.status, SyncStatus::Updated { inserted: 31 });
    assert_eq!(store.row_count("BTCUSDT").unwrap(), 31);
    assert_eq!(store.latest_date("BTCUSDT").unwrap(), Some(today()));

    let requests = feed.requests();
    assert_eq!(requests.first(), Some(&(date(2024, 3, 1), date(2024, 3, 7))));
    assert_eq!(requests.last(), Some(&(date(2024, 3, 29), today())));
    assert!(requests.iter().all(|(s, e)| (*e - *s).num_days() < 7));
    assert_eq!(throttle.pauses(), 4, "pause between windows, not after the last");
}

#[test]
fn current_store_fetches_nothing() {
    let feed = Arc::new(ScriptedFeed::default());
    let store = Arc::new(MemoryStore::new());
    seed_store(store.as_ref(), today());
    let sync = engine(feed.clone(), store.clone(), Arc::new(NoDelay::new()));

    let outcome = sync.sync_until(today());
    assert_eq!(outcome.status, SyncStatus::AlreadyCurrent);
    assert_eq!(outcome.status.to_string(), "data already current");
    assert!(feed.requests().is_empty());
    assert_eq!(
        outcome.phases,
        vec![SyncPhase::Unsynced, SyncPhase::Scanning, SyncPhase::Synced]
    );
}

#[test]
fn one_failing_window_does_not_block_the_others() {
    let latest = today() - Duration::days(21);
    let feed = Arc::new(ScriptedFeed {
        fail_starts: [latest + Duration::days(8)].into_iter().collect(),
        ..Default::default()
    });
    let store = Arc::new(MemoryStore::new());
    seed_store(store.as_ref(), latest);
    let sync = engine(feed.clone(), store.clone(), Arc::new(NoDelay::new()));

    let outcome = sync.sync_until(today());
    assert_eq!(feed.requests().len(), 3);
    assert_eq!(outcome.failed_windows.len(), 1);
    assert_eq!(outcome.failed_windows[0].start, latest + Duration::days(8));
    assert_eq!(outcome.status, SyncStatus::Updated { inserted: 14 });
    assert_eq!(store.row_count("BTCUSDT").unwrap(), 15);
    assert_eq!(
        outcome.phases,
        vec![
            SyncPhase::Unsynced,
            SyncPhase::Scanning,
            SyncPhase::Fetching(0),
            SyncPhase::Fetching(1),
            SyncPhase::Fetching(2),
            SyncPhase::Normalizing,
            SyncPhase::Appending,
            SyncPhase::Synced,
        ]
    );
}

#[test]
fn all_windows_failing_reports_stale_data() {
    let latest = today() - Duration::days(3);
    let feed = Arc::new(ScriptedFeed {
        fail_starts: [latest + Duration::days(1)].into_iter().collect(),
        ..Default::default()
    });
    let store = Arc::new(MemoryStore::new());
    seed_store(store.as_ref(), latest);
    let sync = engine(feed, store.clone(), Arc::new(NoDelay::new()));

    let outcome = sync.sync_until(today());
    assert!(matches!(outcome.status, SyncStatus::CheckFailed { .. }));
    assert!(outcome.status.to_string().contains("stale data"));
    assert_eq!(store.row_count("BTCUSDT").unwrap(), 1);
}

#[test]
fn second_run_is_idempotent() {
    let feed = Arc::new(ScriptedFeed::default());
    let store = Arc::new(MemoryStore::new());
    let sync = engine(feed, store.clone(), Arc::new(NoDelay::new()));

    sync.sync_until(today());
    let after_first = store.row_count("BTCUSDT").unwrap();
    let second = sync.sync_until(today());

    assert_eq!(second.status, SyncStatus::AlreadyCurrent);
    assert_eq!(store.row_count("BTCUSDT").unwrap(), after_first);
}

#[test]
fn overlapping_rows_are_not_duplicated() {
    let latest = today() - Duration::days(5);
    let feed = Arc::new(ScriptedFeed {
        overlap: true,
        ..Default::default()
    });
    let store = Arc::new(MemoryStore::new());
    seed_store(store.as_ref(), latest);
    let sync = engine(feed, store.clone(), Arc::new(NoDelay::new()));

    let outcome = sync.sync_until(today());
    assert_eq!(outcome.status, SyncStatus::Updated { inserted: 5 });
    let candles = store.load("BTCUSDT").unwrap();
    assert_eq!(candles.len(), 6);
    assert!(klinelab_core::domain::is_strictly_ordered(&candles));
}

struct BrokenStore;

impl CandleStore for BrokenStore {
    fn latest_date(&self, _symbol: &str) -> Result<Option<NaiveDate>, DataError> {
        Err(DataError::StoreError("disk unavailable".into()))
    }

    fn append(&self, _symbol: &str, _candles: &[Candle]) -> Result<usize, DataError> {
        Err(DataError::StoreError("disk unavailable".into()))
    }

    fn load(&self, _symbol: &str) -> Result<Vec<Candle>, DataError> {
        Ok(Vec::new())
    }
}

#[test]
fn store_failure_never_panics() {
    let feed = Arc::new(ScriptedFeed::default());
    let sync = engine(feed.clone(), Arc::new(BrokenStore), Arc::new(NoDelay::new()));
    let outcome = sync.sync_until(today());
    assert!(matches!(outcome.status, SyncStatus::CheckFailed { .. }));
    assert!(feed.requests().is_empty());
}

#[test]
fn parquet_store_sync_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(ScriptedFeed::default());
    let store = Arc::new(ParquetStore::new(dir.path()));
    let sync = engine(feed, store.clone(), Arc::new(NoDelay::new()));

    let first = sync.sync_until(today());
    assert_eq!(first.status, SyncStatus::Updated { inserted: 31 });

    // A fresh handle on the same directory sees the persisted series.
    let reopened = ParquetStore::new(dir.path());
    assert_eq!(reopened.latest_date("BTCUSDT").unwrap(), Some(today()));
    let candles = reopened.load("BTCUSDT").unwrap();
    assert_eq!(candles.len(), 31);
    assert_eq!(candles[0].date, date(2024, 3, 1));
    assert!(candles.iter().all(|c| c.is_sane()));

    let second = sync.sync_until(today());
    assert_eq!(second.status, SyncStatus::AlreadyCurrent);
    assert_eq!(reopened.row_count("BTCUSDT").unwrap(), 31);
}

#[test]
fn reopened_parquet_store_skips_refetched_rows() {
    let dir = tempfile::tempdir().unwrap();
    let first = SyncEngine::new(
        "BTCUSDT",
        Arc::new(ScriptedFeed::default()),
        Arc::new(ParquetStore::new(dir.path())),
        Arc::new(NoDelay::new()),
        SyncConfig::default(),
    );
    assert_eq!(
        first.sync_until(today()).status,
        SyncStatus::Updated { inserted: 31 }
    );

    // A later run in a new process: the feed resends the last stored day and
    // has nothing newer yet.
    let feed = Arc::new(ScriptedFeed {
        overlap: true,
        available_until: Some(today()),
        ..Default::default()
    });
    let reopened = Arc::new(ParquetStore::new(dir.path()));
    let second = engine(feed.clone(), reopened.clone(), Arc::new(NoDelay::new()));
    let outcome = second.sync_until(today() + Duration::days(3));

    assert_eq!(feed.requests().len(), 1);
    assert!(outcome.failed_windows.is_empty());
    assert_eq!(outcome.status, SyncStatus::AlreadyCurrent);
    assert_eq!(outcome.status.to_string(), "data already current");
    assert_eq!(reopened.row_count("BTCUSDT").unwrap(), 31);
    assert_eq!(
        ParquetStore::new(dir.path()).load("BTCUSDT").unwrap().len(),
        31
    );
}

#[test]
fn quarantined_partition_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ParquetStore::new(dir.path()));
    let sync = engine(
        Arc::new(ScriptedFeed::default()),
        store.clone(),
        Arc::new(NoDelay::new()),
    );
    let today = date(2024, 1, 10);

    // Backfill spans 2023-12-11 ..= 2024-01-10, two year partitions.
    assert_eq!(
        sync.sync_until(today).status,
        SyncStatus::Updated { inserted: 31 }
    );
    std::fs::write(dir.path().join("symbol=BTCUSDT/2024.parquet"), b"torn write").unwrap();

    let report = sync.scan(today).unwrap();
    assert_eq!(report.latest_date, Some(date(2023, 12, 31)));
    assert_eq!(report.missing, Some((date(2024, 1, 1), today)));

    let outcome = sync.sync_until(today);
    assert_eq!(outcome.status, SyncStatus::Updated { inserted: 10 });
    assert_eq!(store.row_count("BTCUSDT").unwrap(), 31);
}
