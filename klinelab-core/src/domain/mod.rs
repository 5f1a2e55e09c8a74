//! Domain types for KlineLab

pub mod candle;
pub mod market;
pub mod quote;

pub use candle::{is_strictly_ordered, Candle, CandleKey};
pub use market::{normalize_symbol, Interval, SymbolError, DEFAULT_QUOTE_ASSET};
pub use quote::{OrderBookTop, RealTimeQuote, Ticker};

/// Symbol type alias
pub type Symbol = String;
