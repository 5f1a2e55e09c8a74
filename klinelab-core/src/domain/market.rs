//! Trading-pair symbols and bar intervals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quote asset appended to bare base-asset symbols.
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("empty symbol; use a trading pair such as 'BTCUSDT'")]
    Empty,

    #[error("invalid symbol '{0}'; use a trading pair such as 'BTCUSDT'")]
    Malformed(String),
}

/// Normalize user input into an exchange trading pair.
///
/// Trims and uppercases, fixes the `BCT` typo, and appends `USDT` when no
/// quote asset is present (`btc` → `BTCUSDT`).
pub fn normalize_symbol(input: &str) -> Result<String, SymbolError> {
    let mut symbol = input.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(SymbolError::Empty);
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SymbolError::Malformed(input.trim().to_string()));
    }
    if symbol == "BCT" {
        symbol = "BTC".to_string();
    }
    if !symbol.contains(DEFAULT_QUOTE_ASSET) {
        symbol.push_str(DEFAULT_QUOTE_ASSET);
    }
    Ok(symbol)
}

/// Kline bar interval, using the exchange's interval codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
        }
    }

    /// Bar length in milliseconds.
    pub fn millis(&self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Interval::OneMinute => MINUTE,
            Interval::FiveMinutes => 5 * MINUTE,
            Interval::FifteenMinutes => 15 * MINUTE,
            Interval::OneHour => 60 * MINUTE,
            Interval::FourHours => 240 * MINUTE,
            Interval::OneDay => 1_440 * MINUTE,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            other => Err(format!(
                "unknown interval '{other}' (expected 1m, 5m, 15m, 1h, 4h or 1d)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_base_asset_gets_quote() {
        assert_eq!(normalize_symbol(" btc ").unwrap(), "BTCUSDT");
        assert_eq!(normalize_symbol("ethusdt").unwrap(), "ETHUSDT");
    }

    #[test]
    fn common_typo_is_fixed() {
        assert_eq!(normalize_symbol("bct").unwrap(), "BTCUSDT");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert_eq!(normalize_symbol("   "), Err(SymbolError::Empty));
        assert!(matches!(
            normalize_symbol("BTC/USDT"),
            Err(SymbolError::Malformed(_))
        ));
    }

    #[test]
    fn interval_codes_roundtrip() {
        for iv in [
            Interval::OneMinute,
            Interval::FiveMinutes,
            Interval::FifteenMinutes,
            Interval::OneHour,
            Interval::FourHours,
            Interval::OneDay,
        ] {
            assert_eq!(iv.as_str().parse::<Interval>().unwrap(), iv);
        }
        assert!("2w".parse::<Interval>().is_err());
        assert_eq!(Interval::OneDay.millis(), 86_400_000);
    }
}
