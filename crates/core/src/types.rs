use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upbit-style market code: quote currency first, e.g. `KRW-BTC`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MarketCode {
    pub quote: String,
    pub base: String,
}

impl MarketCode {
    pub fn new(quote: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            base: base.into(),
        }
    }

    /// KRW market for a coin symbol, e.g. `krw("btc")` -> `KRW-BTC`.
    pub fn krw(base: impl AsRef<str>) -> Self {
        Self::new("KRW", base.as_ref().trim().to_uppercase())
    }

    /// Parse `QUOTE-BASE`, case-insensitive, surrounding whitespace ignored.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let (quote, base) = trimmed.split_once('-')?;
        let quote = quote.trim();
        let base = base.trim();
        if quote.is_empty() || base.is_empty() {
            return None;
        }
        Some(Self::new(quote.to_uppercase(), base.to_uppercase()))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for MarketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.quote, self.base)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Krw,
    Usd,
}

/// Immutable price snapshot, created per request and discarded after the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub market: String,
    pub price: f64,
    pub currency: Currency,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_lowercase_and_whitespace() {
        let market = MarketCode::parse("  krw-btc ").unwrap();
        assert_eq!(market.quote(), "KRW");
        assert_eq!(market.base(), "BTC");
        assert_eq!(market.to_string(), "KRW-BTC");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(MarketCode::parse("KRWBTC").is_none());
        assert!(MarketCode::parse("KRW-").is_none());
        assert!(MarketCode::parse("-BTC").is_none());
        assert!(MarketCode::parse("").is_none());
    }

    #[test]
    fn krw_helper_uppercases_the_coin() {
        assert_eq!(MarketCode::krw("eth").to_string(), "KRW-ETH");
    }

    #[test]
    fn currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::Krw).unwrap(), "\"KRW\"");
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
    }
}
