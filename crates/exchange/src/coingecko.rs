use crate::error::ExchangeError;
use kc_core::config::AppConfig;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

const UPSTREAM: &str = "coingecko";

/// Symbol -> CoinGecko id shortcuts for the coins people actually ask about.
/// Anything not listed here falls back to the `/search` endpoint.
const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("XRP", "ripple"),
    ("SOL", "solana"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("AVAX", "avalanche-2"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("ATOM", "cosmos"),
    ("LTC", "litecoin"),
    ("BCH", "bitcoin-cash"),
    ("ETC", "ethereum-classic"),
    ("NEAR", "near"),
    ("APT", "aptos"),
    ("ARB", "arbitrum"),
    ("OP", "optimism"),
    ("SUI", "sui"),
    ("TRX", "tron"),
    ("SHIB", "shiba-inu"),
    ("PEPE", "pepe"),
    ("BNB", "binancecoin"),
    ("TON", "the-open-network"),
    ("STX", "blockstack"),
    ("SAND", "the-sandbox"),
    ("MANA", "decentraland"),
];

pub fn static_id_for(symbol: &str) -> Option<&'static str> {
    let symbol = symbol.trim().to_uppercase();
    COINGECKO_IDS
        .iter()
        .find(|(sym, _)| *sym == symbol)
        .map(|(_, id)| *id)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
}

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(config.coingecko_endpoint.clone(), config.http_timeout_secs)
    }

    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ExchangeError> {
        Ok(Self {
            http: crate::build_http_client(timeout_secs)?,
            base_url: base_url.into(),
        })
    }

    /// USD spot price for a CoinGecko id.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn simple_price_usd(&self, id: &str) -> Result<f64, ExchangeError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, id
        );
        tracing::debug!("coingecko GET {}", url);

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

        let prices: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))?;

        prices
            .get(id)
            .and_then(|currencies| currencies.get("usd"))
            .copied()
            .ok_or_else(|| ExchangeError::NotFound(id.to_string()))
    }

    /// First hit of the `/search` endpoint for a free-form query.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search_first_id(&self, query: &str) -> Result<String, ExchangeError> {
        let url = format!("{}/search?query={}", self.base_url, query);
        tracing::debug!("coingecko GET {}", url);

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

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))?;

        search
            .coins
            .into_iter()
            .next()
            .map(|coin| coin.id)
            .ok_or_else(|| ExchangeError::NotFound(query.to_string()))
    }

    /// Resolve a coin symbol to a CoinGecko id: static table first, then the
    /// search endpoint.
    pub async fn resolve_id(&self, symbol: &str) -> Result<String, ExchangeError> {
        if let Some(id) = static_id_for(symbol) {
            return Ok(id.to_string());
        }
        self.search_first_id(symbol.trim()).await
    }
}
