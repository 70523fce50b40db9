pub mod bithumb;
pub mod coingecko;
pub mod error;
pub mod fx;
pub mod upbit;

pub use bithumb::BithumbClient;
pub use coingecko::CoinGeckoClient;
pub use error::ExchangeError;
pub use fx::{FxClient, FALLBACK_USD_KRW};
pub use upbit::UpbitClient;

use kc_core::config::AppConfig;

/// One bundle of every upstream client, built from configuration in a single
/// place and shared by the HTTP server, the MCP server and the CLI.
#[derive(Debug, Clone)]
pub struct ExchangeClients {
    pub upbit: UpbitClient,
    pub bithumb: BithumbClient,
    pub coingecko: CoinGeckoClient,
    pub fx: FxClient,
}

impl ExchangeClients {
    pub fn from_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Ok(Self {
            upbit: UpbitClient::from_config(config)?,
            bithumb: BithumbClient::from_config(config)?,
            coingecko: CoinGeckoClient::from_config(config)?,
            fx: FxClient::from_config(config)?,
        })
    }
}

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, ExchangeError> {
    reqwest::Client::builder()
        .user_agent(concat!("korean-crypto/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|err| ExchangeError::Unavailable {
            upstream: "http",
            message: err.to_string(),
        })
}
