//! Data layer: price feed, persisted candle stores, incremental sync.

pub mod binance;
pub mod circuit_breaker;
pub mod parquet_store;
pub mod provider;
pub mod store;
pub mod sync;
pub mod throttle;

pub use binance::BinanceFeed;
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use parquet_store::{ParquetStore, StoreMeta};
pub use provider::{DataError, PriceFeed, RawKline};
pub use store::{CandleStore, MemoryStore};
pub use sync::{
    fetch_windows, normalize_klines, parse_kline, FailedWindow, SyncEngine, SyncGapReport,
    SyncOutcome, SyncPhase, SyncStatus,
};
pub use throttle::{FixedDelay, NoDelay, Throttle};
