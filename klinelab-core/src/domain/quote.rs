//! Real-time quote assembled from the 24h ticker and the top of the order book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 24-hour rolling ticker statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub volume: f64,
}

/// Best bid/ask. Empty book sides are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBookTop {
    pub bid: Option<(f64, f64)>,
    pub ask: Option<(f64, f64)>,
}

/// Snapshot of the live market for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeQuote {
    pub symbol: String,
    pub current_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_qty: f64,
    pub ask_qty: f64,
    pub change_24h: f64,
    pub change_pct_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
    pub fetched_at: DateTime<Utc>,
}

impl RealTimeQuote {
    /// Combine a ticker and book top. Missing book sides become 0.0.
    pub fn from_parts(ticker: Ticker, book: OrderBookTop, fetched_at: DateTime<Utc>) -> Self {
        let (bid, bid_qty) = book.bid.unwrap_or((0.0, 0.0));
        let (ask, ask_qty) = book.ask.unwrap_or((0.0, 0.0));
        Self {
            symbol: ticker.symbol,
            current_price: ticker.last_price,
            bid,
            ask,
            bid_qty,
            ask_qty,
            change_24h: ticker.price_change,
            change_pct_24h: ticker.price_change_percent,
            high_24h: ticker.high_price,
            low_24h: ticker.low_price,
            volume_24h: ticker.volume,
            fetched_at,
        }
    }

    /// A usable quote has a finite, strictly positive price.
    pub fn is_valid(&self) -> bool {
        self.current_price.is_finite() && self.current_price > 0.0
    }

    /// Bid/ask spread, when both sides are present.
    pub fn spread(&self) -> Option<f64> {
        (self.bid > 0.0 && self.ask > 0.0).then(|| self.ask - self.bid)
    }
}
