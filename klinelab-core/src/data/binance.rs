//! Binance spot REST price feed.
//!
//! Blocking client for the public market-data endpoints: 24h ticker, order
//! book depth and klines. Handles retries with exponential backoff, the
//! circuit breaker and exchange error codes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, PriceFeed, RawKline};
use crate::config::FeedConfig;
use crate::domain::{Interval, OrderBookTop, Ticker};

/// Maximum klines per request.
pub const KLINE_PAGE_LIMIT: usize = 1000;

/// Exchange error code for an unknown trading pair.
const INVALID_SYMBOL_CODE: i64 = -1121;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    symbol: String,
    last_price: String,
    price_change: String,
    price_change_percent: String,
    high_price: String,
    low_price: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

pub struct BinanceFeed {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceFeed {
    pub fn new(config: &FeedConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("klinelab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// GET `path` with retry and circuit breaker logic, returning the JSON body.
    fn get_json(&self, symbol: &str, path: &str, query: &[(&str, String)]) -> Result<Value, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = format!("{}{path}", self.base_url);
        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.base_delay, attempt, retry_after.take());
                debug!(attempt, delay_ms = delay.as_millis() as u64, path, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(&url).query(query).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::IM_A_TEAPOT {
                        // IP ban
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let wait_secs = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok());
                        retry_after = wait_secs.map(Duration::from_secs);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: wait_secs.unwrap_or(60),
                        });
                        continue;
                    }

                    if status.is_client_error() {
                        let body = resp.text().unwrap_or_default();
                        return Err(classify_client_error(symbol, status.as_u16(), &body));
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let body: Value = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(path, error = %e, "request failed");
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RawKline>, DataError> {
        let mut query = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.as_str().to_string()),
            ("limit", limit.clamp(1, KLINE_PAGE_LIMIT).to_string()),
        ];
        if let Some(start) = start_ms {
            query.push(("startTime", start.to_string()));
        }
        if let Some(end) = end_ms {
            query.push(("endTime", end.to_string()));
        }
        let body = self.get_json(symbol, "/api/v3/klines", &query)?;
        parse_klines(&body)
    }
}

/// Exponential backoff for `attempt` (1-based), never shorter than the
/// server's `Retry-After`.
fn retry_delay(base: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let backoff = base * 2u32.pow(attempt.saturating_sub(1));
    retry_after.map_or(backoff, |wait| backoff.max(wait))
}

fn classify_client_error(symbol: &str, status: u16, body: &str) -> DataError {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) if err.code == INVALID_SYMBOL_CODE || err.msg.contains("Invalid symbol") => {
            DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }
        }
        Ok(err) => DataError::Other(format!("HTTP {status} ({}): {}", err.code, err.msg)),
        Err(_) => DataError::Other(format!("HTTP {status} for {symbol}")),
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<f64, DataError> {
    value
        .parse::<f64>()
        .map_err(|_| DataError::ResponseFormatChanged(format!("{field} is not numeric: '{value}'")))
}

fn parse_ticker(body: Value) -> Result<Ticker, DataError> {
    let raw: TickerResponse = serde_json::from_value(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("ticker: {e}")))?;
    Ok(Ticker {
        last_price: parse_decimal("lastPrice", &raw.last_price)?,
        price_change: parse_decimal("priceChange", &raw.price_change)?,
        price_change_percent: parse_decimal("priceChangePercent", &raw.price_change_percent)?,
        high_price: parse_decimal("highPrice", &raw.high_price)?,
        low_price: parse_decimal("lowPrice", &raw.low_price)?,
        volume: parse_decimal("volume", &raw.volume)?,
        symbol: raw.symbol,
    })
}

fn parse_depth(body: Value) -> Result<OrderBookTop, DataError> {
    let raw: DepthResponse = serde_json::from_value(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("depth: {e}")))?;
    let level = |side: &[(String, String)]| -> Result<Option<(f64, f64)>, DataError> {
        side.first()
            .map(|(p, q)| Ok::<_, DataError>((parse_decimal("price", p)?, parse_decimal("qty", q)?)))
            .transpose()
    };
    Ok(OrderBookTop {
        bid: level(&raw.bids)?,
        ask: level(&raw.asks)?,
    })
}

/// Parse the kline array-of-arrays. Numeric fields stay as strings;
/// rows too short to carry the seven leading fields are a format change.
fn parse_klines(body: &Value) -> Result<Vec<RawKline>, DataError> {
    let rows = body
        .as_array()
        .ok_or_else(|| DataError::ResponseFormatChanged("klines: expected an array".into()))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| -> Result<RawKline, DataError> {
            let fields = row
                .as_array()
                .filter(|f| f.len() >= 7)
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("kline row {i} malformed")))?;
            let millis = |v: &Value| {
                v.as_i64()
                    .ok_or_else(|| DataError::ResponseFormatChanged(format!("kline row {i}: bad timestamp")))
            };
            let text = |v: &Value| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(RawKline {
                open_time: millis(&fields[0])?,
                open: text(&fields[1]),
                high: text(&fields[2]),
                low: text(&fields[3]),
                close: text(&fields[4]),
                volume: text(&fields[5]),
                close_time: millis(&fields[6])?,
            })
        })
        .collect()
}

fn day_start_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

impl PriceFeed for BinanceFeed {
    fn name(&self) -> &str {
        "binance"
    }

    fn ticker(&self, symbol: &str) -> Result<Ticker, DataError> {
        let body = self.get_json(symbol, "/api/v3/ticker/24hr", &[("symbol", symbol.to_string())])?;
        parse_ticker(body)
    }

    fn order_book_top(&self, symbol: &str) -> Result<OrderBookTop, DataError> {
        let body = self.get_json(
            symbol,
            "/api/v3/depth",
            &[("symbol", symbol.to_string()), ("limit", "5".to_string())],
        )?;
        parse_depth(body)
    }

    fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawKline>, DataError> {
        let end_ms = day_start_ms(end.succ_opt().unwrap_or(end)) - 1;
        let mut cursor = day_start_ms(start);
        let mut out = Vec::new();

        while cursor <= end_ms {
            let page = self.fetch_klines(symbol, interval, Some(cursor), Some(end_ms), KLINE_PAGE_LIMIT)?;
            let Some(last) = page.last() else { break };
            let next = last.open_time + 1;
            let full = page.len() >= KLINE_PAGE_LIMIT;
            out.extend(page);
            if !full || next <= cursor {
                break;
            }
            cursor = next;
        }

        debug!(symbol, %start, %end, rows = out.len(), "klines fetched");
        Ok(out)
    }

    fn recent_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<RawKline>, DataError> {
        self.fetch_klines(symbol, interval, None, None, limit)
    }
}
