//! Short-horizon close-price forecast.
//!
//! Primary model: AR(p) on first differences of closes (ARIMA(p,1,0), no
//! constant) fitted by ordinary least squares. When the fit fails the
//! trend/volatility fallback runs instead:
//!
//! `price[h] = last * (1 + trend + ε)`, `trend = last / MA7 − 1`,
//! `ε ~ N(0, σ)` where σ is the sample standard deviation of daily returns.
//! The noise stream is seeded from the master seed, the symbol and the last
//! candle date, so equal inputs give equal forecasts.

use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ForecastConfig;
use crate::domain::Candle;
use crate::error::AnalysisError;
use crate::rng::SeedHierarchy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Autoregressive { order: usize },
    TrendVolatility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub symbol: String,
    pub method: ForecastMethod,
    pub history_len: usize,
    /// Relative half-width of the band around each point.
    pub band: f64,
    pub points: Vec<ForecastPoint>,
    /// Fallback only.
    pub trend: Option<f64>,
    /// Fallback only.
    pub volatility: Option<f64>,
    /// Why the primary model was skipped, if it was.
    pub fallback_reason: Option<String>,
}

/// AR coefficients `phi[0..p]` for lags `1..=p`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArModel {
    pub coefficients: Vec<f64>,
}

impl ArModel {
    /// Iterate the recursion `steps` times past the end of `diffs`.
    pub fn forecast_diffs(&self, diffs: &[f64], steps: usize) -> Vec<f64> {
        let p = self.coefficients.len();
        let mut history: Vec<f64> = diffs.to_vec();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            let n = history.len();
            let next: f64 = (0..p)
                .map(|lag| {
                    let past = n.checked_sub(lag + 1).map_or(0.0, |i| history[i]);
                    self.coefficients[lag] * past
                })
                .sum();
            history.push(next);
            out.push(next);
        }
        out
    }
}

/// Fit AR(`order`) without intercept to `diffs` by least squares.
pub fn fit_ar(diffs: &[f64], order: usize) -> Result<ArModel, AnalysisError> {
    if order == 0 {
        return Err(AnalysisError::ModelFitFailure("AR order must be positive".into()));
    }
    if diffs.len() <= 2 * order {
        return Err(AnalysisError::ModelFitFailure(format!(
            "{} differences are too few for AR({order})",
            diffs.len()
        )));
    }
    if diffs.iter().any(|d| !d.is_finite()) {
        return Err(AnalysisError::ModelFitFailure("non-finite input".into()));
    }

    // Lag design matrix over rows t = order..n: column j holds diff[t - j - 1].
    let rows = diffs.len() - order;
    let x = DMatrix::from_fn(rows, order, |r, c| diffs[order + r - c - 1]);
    let y = DVector::from_column_slice(&diffs[order..]);

    // OLS: phi = (X'X)^(-1) X'y
    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;
    let phi = xtx
        .try_inverse()
        .map(|inv| inv * xty)
        .filter(|phi| phi.iter().all(|v| v.is_finite()))
        .ok_or_else(|| AnalysisError::ModelFitFailure("singular normal matrix".into()))?;

    let coefficients = phi.iter().copied().collect();
    Ok(ArModel { coefficients })
}

/// Primary path: price levels for `horizon` steps past the last close.
pub fn forecast_autoregressive(
    closes: &[f64],
    horizon: usize,
    config: &ForecastConfig,
) -> Result<Vec<f64>, AnalysisError> {
    if closes.len() < config.min_history {
        return Err(AnalysisError::ModelFitFailure(format!(
            "need {} closes, got {}",
            config.min_history,
            closes.len()
        )));
    }
    let diffs: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let model = fit_ar(&diffs, config.ar_order)?;

    let mut level = closes[closes.len() - 1];
    let prices: Vec<f64> = model
        .forecast_diffs(&diffs, horizon)
        .into_iter()
        .map(|d| {
            level += d;
            level
        })
        .collect();

    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(AnalysisError::ModelFitFailure("forecast diverged".into()));
    }
    Ok(prices)
}

/// Sample standard deviation of close-to-close returns (ddof = 1).
pub fn return_volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Fallback path. Returns `(prices, trend, volatility)`.
pub fn forecast_trend_volatility<R: Rng>(
    closes: &[f64],
    horizon: usize,
    config: &ForecastConfig,
    rng: &mut R,
) -> Result<(Vec<f64>, f64, f64), AnalysisError> {
    let window = config.fallback_ma_window.max(1);
    if closes.len() < window {
        return Err(AnalysisError::InsufficientHistory {
            needed: window,
            got: closes.len(),
        });
    }
    let last = closes[closes.len() - 1];
    let ma = closes[closes.len() - window..].iter().sum::<f64>() / window as f64;
    let trend = if ma > 0.0 { last / ma - 1.0 } else { 0.0 };
    let volatility = return_volatility(closes);

    let noise = Normal::new(0.0, volatility)
        .map_err(|e| AnalysisError::ModelFitFailure(format!("volatility {volatility}: {e}")))?;
    let prices = (0..horizon)
        .map(|_| last * (1.0 + trend + noise.sample(rng)))
        .collect();
    Ok((prices, trend, volatility))
}

/// Forecast `horizon` daily closes after the last candle.
pub fn forecast(
    symbol: &str,
    candles: &[Candle],
    horizon: usize,
    config: &ForecastConfig,
) -> Result<Forecast, AnalysisError> {
    let last_date = candles
        .last()
        .map(|c| c.date)
        .ok_or(AnalysisError::InsufficientHistory { needed: 1, got: 0 })?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let (method, prices, trend, volatility, fallback_reason) =
        match forecast_autoregressive(&closes, horizon, config) {
            Ok(prices) => (
                ForecastMethod::Autoregressive {
                    order: config.ar_order,
                },
                prices,
                None,
                None,
                None,
            ),
            Err(e) => {
                warn!(symbol, error = %e, "AR fit failed, using trend/volatility fallback");
                let mut rng = SeedHierarchy::new(config.master_seed).rng_for(symbol, last_date);
                let (prices, trend, vol) =
                    forecast_trend_volatility(&closes, horizon, config, &mut rng)?;
                (
                    ForecastMethod::TrendVolatility,
                    prices,
                    Some(trend),
                    Some(vol),
                    Some(e.to_string()),
                )
            }
        };

    let points = prices
        .into_iter()
        .enumerate()
        .map(|(i, price)| ForecastPoint {
            date: last_date + Duration::days(i as i64 + 1),
            price,
            lower: price * (1.0 - config.band),
            upper: price * (1.0 + config.band),
        })
        .collect();

    Ok(Forecast {
        symbol: symbol.to_string(),
        method,
        history_len: candles.len(),
        band: config.band,
        points,
        trend,
        volatility,
        fallback_reason,
    })
}

/// Markdown table plus notes.
pub fn format_forecast(f: &Forecast) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**{} forecast, next {} days**\n", f.symbol, f.points.len());
    let _ = writeln!(out, "| Date | Close (USDT) | Low | High |\n|---|---|---|---|");
    for p in &f.points {
        let _ = writeln!(
            out,
            "| {} | {:.2} | {:.2} | {:.2} |",
            p.date, p.price, p.lower, p.upper
        );
    }
    let _ = writeln!(out);
    match f.method {
        ForecastMethod::Autoregressive { order } => {
            let _ = writeln!(
                out,
                "- Model: ARIMA({order},1,0) on the last {} daily closes",
                f.history_len
            );
        }
        ForecastMethod::TrendVolatility => {
            let _ = writeln!(out, "- Model: trend + volatility fallback");
            if let (Some(trend), Some(vol)) = (f.trend, f.volatility) {
                let dir = if trend > 0.0 { "up" } else { "down" };
                let _ = writeln!(out, "- Volatility: {:.2}%", vol * 100.0);
                let _ = writeln!(out, "- Trend: {dir} {:.2}%", trend.abs() * 100.0);
            }
        }
    }
    let _ = writeln!(
        out,
        "- Band: ±{:.0}% around each point; for reference only",
        f.band * 100.0
    );
    out
}
