use crate::error::ExchangeError;
use chrono::{DateTime, Utc};
use kc_core::config::AppConfig;
use kc_core::types::{Currency, MarketCode, PriceQuote};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const UPSTREAM: &str = "upbit";

/// Upbit caps both parameters server-side; we clamp before the call goes out.
pub const MAX_MARKETS_PER_CALL: usize = 100;
pub const MAX_CANDLE_COUNT: usize = 200;

/// Candle intervals Upbit serves. Anything else is rejected before the call.
const VALID_INTERVALS: &[&str] = &[
    "days",
    "weeks",
    "months",
    "minutes/1",
    "minutes/3",
    "minutes/5",
    "minutes/10",
    "minutes/15",
    "minutes/30",
    "minutes/60",
    "minutes/240",
];

pub fn is_valid_interval(interval: &str) -> bool {
    VALID_INTERVALS.contains(&interval)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitTicker {
    pub market: String,
    pub trade_price: f64,
    pub change: String,
    pub signed_change_rate: f64,
    pub signed_change_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub acc_trade_price_24h: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitMarket {
    pub market: String,
    pub korean_name: String,
    pub english_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitOrderbook {
    pub market: String,
    pub timestamp: i64,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    pub orderbook_units: Vec<UpbitOrderbookUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitOrderbookUnit {
    pub ask_price: f64,
    pub bid_price: f64,
    pub ask_size: f64,
    pub bid_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpbitCandle {
    pub market: String,
    pub candle_date_time_utc: String,
    pub candle_date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct UpbitClient {
    http: Client,
    base_url: String,
}

impl UpbitClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(config.upbit_endpoint.clone(), config.http_timeout_secs)
    }

    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ExchangeError> {
        Ok(Self {
            http: crate::build_http_client(timeout_secs)?,
            base_url: base_url.into(),
        })
    }

    /// Current tickers for one or more market codes, comma-joined upstream.
    /// Callers with more than [`MAX_MARKETS_PER_CALL`] markets must chunk.
    #[instrument(skip(self), fields(markets = markets.len()))]
    pub async fn get_tickers(&self, markets: &[String]) -> Result<Vec<UpbitTicker>, ExchangeError> {
        let joined = markets.join(",");
        let path = format!("/ticker?markets={joined}");
        let tickers: Vec<UpbitTicker> = self.get_json(&path, &joined).await?;
        if tickers.is_empty() {
            return Err(ExchangeError::NotFound(joined));
        }
        Ok(tickers)
    }

    #[instrument(skip(self))]
    pub async fn get_markets(&self) -> Result<Vec<UpbitMarket>, ExchangeError> {
        self.get_json("/market/all?isDetails=false", "market/all")
            .await
    }

    #[instrument(skip(self), fields(market = %market))]
    pub async fn get_orderbook(&self, market: &MarketCode) -> Result<UpbitOrderbook, ExchangeError> {
        let path = format!("/orderbook?markets={market}");
        let books: Vec<UpbitOrderbook> = self.get_json(&path, &market.to_string()).await?;
        books
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::NotFound(market.to_string()))
    }

    /// Candles for a market. `interval` must be one of the Upbit intervals
    /// (see [`is_valid_interval`]); `count` is clamped to [`MAX_CANDLE_COUNT`].
    #[instrument(skip(self), fields(market = %market, interval = %interval))]
    pub async fn get_candles(
        &self,
        market: &MarketCode,
        interval: &str,
        count: usize,
    ) -> Result<Vec<UpbitCandle>, ExchangeError> {
        let count = count.min(MAX_CANDLE_COUNT);
        let path = format!("/candles/{interval}?market={market}&count={count}");
        self.get_json(&path, &market.to_string()).await
    }

    /// `fetch_price` contract for the KRW market of a coin.
    pub async fn fetch_krw_price(&self, coin: &str) -> Result<PriceQuote, ExchangeError> {
        let market = MarketCode::krw(coin);
        let tickers = self.get_tickers(&[market.to_string()]).await?;
        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::NotFound(market.to_string()))?;
        Ok(PriceQuote {
            market: ticker.market,
            price: ticker.trade_price,
            currency: Currency::Krw,
            timestamp: DateTime::from_timestamp_millis(ticker.timestamp).unwrap_or_else(Utc::now),
        })
    }

    async fn get_json<T>(&self, path_and_query: &str, subject: &str) -> Result<T, ExchangeError>
    where
        T: DeserializeOwned,
    {
        tracing::debug!("upbit GET {}", path_and_query);
        let url = format!("{}{}", self.base_url, path_and_query);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExchangeError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(ExchangeError::Status {
                upstream: UPSTREAM,
                status,
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))
    }
}
