//! KlineLab Core: kline sync, indicators, regime detection, signal scoring,
//! support/resistance levels and strategy decisions.
//!
//! This crate contains the analytical core:
//! - Domain types (candles, quotes, intervals, symbols)
//! - Incremental sync of a persisted candle series from the exchange
//! - Indicator library and the per-request indicator frame
//! - Regime classifier, signal scorer, level calculator, strategy synthesizer
//! - Short-horizon forecast with a seeded fallback model

pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod frame;
pub mod indicators;
pub mod rng;
pub mod strategy;

pub use analysis::{AnalysisReport, ForecastReport, MarketAnalyst, StrategyEngine};
pub use config::KlineLabConfig;
pub use error::AnalysisError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across request workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::RealTimeQuote>();
        require_sync::<domain::RealTimeQuote>();

        // Pipeline types
        require_send::<frame::IndicatorFrame>();
        require_sync::<frame::IndicatorFrame>();
        require_send::<strategy::StrategyDecision>();
        require_sync::<strategy::StrategyDecision>();
        require_send::<forecast::Forecast>();
        require_sync::<forecast::Forecast>();
        require_send::<KlineLabConfig>();
        require_sync::<KlineLabConfig>();

        // Services
        require_send::<StrategyEngine>();
        require_sync::<StrategyEngine>();
        require_send::<MarketAnalyst>();
        require_sync::<MarketAnalyst>();
        require_send::<data::SyncEngine>();
        require_sync::<data::SyncEngine>();
        require_send::<data::BinanceFeed>();
        require_sync::<data::BinanceFeed>();
        require_send::<data::ParquetStore>();
        require_sync::<data::ParquetStore>();
        require_send::<data::MemoryStore>();
        require_sync::<data::MemoryStore>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();

        // RNG
        require_send::<rng::SeedHierarchy>();
        require_sync::<rng::SeedHierarchy>();
    }

    /// Architecture contract: the sync engine only sees the feed through the
    /// trait object, so any `PriceFeed` can stand in for the exchange.
    #[test]
    fn price_feed_is_object_safe() {
        fn _accepts(feed: std::sync::Arc<dyn data::PriceFeed>) -> usize {
            feed.name().len()
        }
    }
}
