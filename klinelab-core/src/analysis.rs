//! Request orchestration.
//!
//! `StrategyEngine` is the pure decision pipeline (frame → regime → scores →
//! levels → decision). `MarketAnalyst` composes it with an injected price
//! feed and turns feed failures into degraded reports: only an invalid
//! symbol or a failed quote is an error, everything after that degrades to
//! a warning so the caller always gets the price.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::KlineLabConfig;
use crate::data::{normalize_klines, PriceFeed};
use crate::domain::{normalize_symbol, Candle, Interval, RealTimeQuote};
use crate::error::AnalysisError;
use crate::forecast::{self, format_forecast, Forecast};
use crate::frame::IndicatorFrame;
use crate::strategy::{
    classify_regime, compute_levels, format_decision, format_quote, rationale, score,
    synthesize, weights_for, StrategyDecision,
};

/// Pure decision pipeline over one indicator frame.
#[derive(Debug, Clone, Default)]
pub struct StrategyEngine {
    config: KlineLabConfig,
}

impl StrategyEngine {
    pub fn new(config: KlineLabConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KlineLabConfig {
        &self.config
    }

    pub fn build_frame(&self, candles: Vec<Candle>) -> IndicatorFrame {
        IndicatorFrame::compute(candles, &self.config.indicators)
    }

    /// Decide on the latest row of `frame`. The quote price is used when
    /// valid, otherwise the last close.
    pub fn decide(
        &self,
        frame: &IndicatorFrame,
        quote: &RealTimeQuote,
    ) -> Result<StrategyDecision, AnalysisError> {
        let row = frame
            .latest()
            .ok_or(AnalysisError::InsufficientHistory { needed: 1, got: 0 })?;
        let price = if quote.is_valid() {
            quote.current_price
        } else {
            warn!(symbol = %quote.symbol, "quote price unusable, deciding on last close");
            row.close
        };

        let regime = classify_regime(frame, &self.config.regime);
        let scores = score(frame, price, regime, &self.config.scoring);
        let levels = compute_levels(frame.candles(), &self.config.levels)?;
        let weights = weights_for(regime, &self.config.scoring);

        debug!(%regime, score = scores.score, atr = row.atr, "decision inputs");
        Ok(synthesize(
            &scores,
            regime,
            &levels,
            price,
            row.atr,
            &weights,
            &self.config.decision,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub symbol: String,
    pub quote: RealTimeQuote,
    /// `None` when history or the decision could not be produced.
    pub strategy: Option<StrategyDecision>,
    /// Markdown body: quote table, then the strategy block when present.
    pub text: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub forecast: Forecast,
    pub text: String,
    pub warnings: Vec<String>,
}

pub struct MarketAnalyst {
    feed: Arc<dyn PriceFeed>,
    engine: StrategyEngine,
}

impl MarketAnalyst {
    pub fn new(feed: Arc<dyn PriceFeed>, engine: StrategyEngine) -> Self {
        Self { feed, engine }
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn quote(&self, input: &str) -> Result<RealTimeQuote, AnalysisError> {
        let symbol = normalize_symbol(input)?;
        Ok(self.feed.quote(&symbol)?)
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, AnalysisError> {
        let raw = self.feed.recent_klines(symbol, interval, limit)?;
        let (candles, dropped) = normalize_klines(&raw);
        if dropped > 0 {
            warn!(symbol, dropped, "dropped malformed klines");
        }
        Ok(candles)
    }

    /// Quote plus strategy for one symbol.
    pub fn analyze(&self, input: &str) -> Result<AnalysisReport, AnalysisError> {
        let symbol = normalize_symbol(input)?;
        let quote = self.feed.quote(&symbol)?;
        let mut text = format_quote(&quote);
        let mut warnings = Vec::new();

        let feed_cfg = &self.engine.config().feed;
        let decision = self
            .fetch_candles(&symbol, feed_cfg.history_interval, feed_cfg.history_limit)
            .and_then(|candles| {
                let frame = self.engine.build_frame(candles);
                self.engine.decide(&frame, &quote)
            });

        let strategy = match decision {
            Ok(d) => {
                info!(%symbol, direction = %d.direction, score = d.score, "strategy decided");
                text.push('\n');
                text.push_str(&format_decision(&d));
                text.push('\n');
                text.push_str(&rationale(&d));
                text.push('\n');
                Some(d)
            }
            Err(e) => {
                warn!(%symbol, error = %e, "strategy unavailable");
                warnings.push(format!("strategy unavailable: {e}"));
                None
            }
        };

        Ok(AnalysisReport {
            symbol,
            quote,
            strategy,
            text,
            warnings,
        })
    }

    /// Daily close forecast for the next `horizon` days.
    pub fn forecast(&self, input: &str, horizon: usize) -> Result<ForecastReport, AnalysisError> {
        let symbol = normalize_symbol(input)?;
        let cfg = &self.engine.config().forecast;
        let horizon = horizon.max(1);
        let limit = (horizon * 10).min(crate::data::binance::KLINE_PAGE_LIMIT);

        let candles = self.fetch_candles(&symbol, Interval::OneDay, limit)?;
        let mut warnings = Vec::new();
        if candles.len() < cfg.min_history {
            warnings.push(format!(
                "only {} daily candles available (fewer than {}); the forecast may be inaccurate",
                candles.len(),
                cfg.min_history
            ));
        }

        let forecast = forecast::forecast(&symbol, &candles, horizon, cfg)?;
        if let Some(reason) = &forecast.fallback_reason {
            warnings.push(format!("primary model failed ({reason}); used trend/volatility fallback"));
        }
        let text = format_forecast(&forecast);
        Ok(ForecastReport {
            forecast,
            text,
            warnings,
        })
    }
}
