//! Price feed trait and structured error types.
//!
//! The `PriceFeed` trait abstracts over the exchange so the sync engine and
//! the analyst can run against a scripted feed in tests.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Interval, OrderBookTop, RealTimeQuote, Ticker};

/// One kline row exactly as the exchange delivers it: epoch milliseconds
/// for the times, decimal strings for the numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawKline {
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time: i64,
}

/// Structured error types for feed and store operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: exchange has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Exchange market-data operations consumed by the core.
pub trait PriceFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// 24h rolling ticker.
    fn ticker(&self, symbol: &str) -> Result<Ticker, DataError>;

    /// Best bid and ask.
    fn order_book_top(&self, symbol: &str) -> Result<OrderBookTop, DataError>;

    /// All klines whose open time falls within `start..=end` (whole UTC days).
    fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawKline>, DataError>;

    /// The most recent `limit` klines.
    fn recent_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<RawKline>, DataError>;

    /// Ticker and book top combined into a quote stamped now.
    fn quote(&self, symbol: &str) -> Result<RealTimeQuote, DataError> {
        let ticker = self.ticker(symbol)?;
        let book = self.order_book_top(symbol)?;
        Ok(RealTimeQuote::from_parts(ticker, book, Utc::now()))
    }
}
