use crate::error::ExchangeError;
use chrono::Utc;
use kc_core::config::AppConfig;
use kc_core::types::{Currency, PriceQuote};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const UPSTREAM: &str = "bithumb";

/// Bithumb answers 200 with this status code for unknown coins.
const STATUS_INVALID_PARAMETER: &str = "5600";
const STATUS_OK: &str = "0000";

/// Bithumb public-API envelope: `status` is "0000" on success, otherwise an
/// error code with a `message` alongside.
#[derive(Debug, Deserialize)]
struct BithumbEnvelope<T> {
    status: String,
    data: Option<T>,
    message: Option<String>,
}

/// Ticker payload; every numeric field arrives as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BithumbTicker {
    pub opening_price: String,
    pub closing_price: String,
    pub min_price: String,
    pub max_price: String,
    #[serde(rename = "units_traded_24H")]
    pub units_traded_24h: String,
    #[serde(rename = "acc_trade_value_24H")]
    pub acc_trade_value_24h: String,
    #[serde(rename = "fluctate_24H")]
    pub fluctate_24h: String,
    #[serde(rename = "fluctate_rate_24H")]
    pub fluctate_rate_24h: String,
    pub date: String,
}

impl BithumbTicker {
    pub fn closing_price_f64(&self) -> Result<f64, ExchangeError> {
        parse_price(UPSTREAM, "closing_price", &self.closing_price)
    }
}

fn parse_price(
    upstream: &'static str,
    field: &str,
    raw: &str,
) -> Result<f64, ExchangeError> {
    raw.parse::<f64>().map_err(|err| ExchangeError::Decode {
        upstream,
        message: format!("{field} {raw:?} is not a number: {err}"),
    })
}

#[derive(Debug, Clone)]
pub struct BithumbClient {
    http: Client,
    base_url: String,
}

impl BithumbClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(config.bithumb_endpoint.clone(), config.http_timeout_secs)
    }

    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ExchangeError> {
        Ok(Self {
            http: crate::build_http_client(timeout_secs)?,
            base_url: base_url.into(),
        })
    }

    #[instrument(skip(self), fields(coin = %coin))]
    pub async fn get_ticker(&self, coin: &str) -> Result<BithumbTicker, ExchangeError> {
        let coin = coin.trim().to_uppercase();
        let url = format!("{}/ticker/{}_KRW", self.base_url, coin);
        tracing::debug!("bithumb GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))?;

        let status = response.status();
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

        let envelope: BithumbEnvelope<BithumbTicker> = response
            .json()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))?;

        if envelope.status != STATUS_OK {
            if envelope.status == STATUS_INVALID_PARAMETER {
                return Err(ExchangeError::NotFound(coin));
            }
            return Err(ExchangeError::Api {
                upstream: UPSTREAM,
                code: envelope.status,
                message: envelope.message.unwrap_or_default(),
            });
        }

        envelope
            .data
            .ok_or(ExchangeError::EmptyResponse("bithumb ticker"))
    }

    /// `fetch_price` contract: KRW closing price for a coin.
    pub async fn fetch_krw_price(&self, coin: &str) -> Result<PriceQuote, ExchangeError> {
        let coin = coin.trim().to_uppercase();
        let ticker = self.get_ticker(&coin).await?;
        Ok(PriceQuote {
            market: format!("{coin}_KRW"),
            price: ticker.closing_price_f64()?,
            currency: Currency::Krw,
            timestamp: Utc::now(),
        })
    }
}
