use crate::error::ExchangeError;
use kc_core::config::AppConfig;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

const UPSTREAM: &str = "fx";

/// Rate applied by the premium calculator when the FX upstream is down.
pub const FALLBACK_USD_KRW: f64 = 1350.0;

#[derive(Debug, Deserialize)]
struct FxResponse {
    result: String,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct FxClient {
    http: Client,
    endpoint: String,
}

impl FxClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(config.fx_endpoint.clone(), config.http_timeout_secs)
    }

    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, ExchangeError> {
        Ok(Self {
            http: crate::build_http_client(timeout_secs)?,
            endpoint: endpoint.into(),
        })
    }

    /// Current USD/KRW rate.
    #[instrument(skip(self))]
    pub async fn usd_krw(&self) -> Result<f64, ExchangeError> {
        tracing::debug!("fx GET {}", self.endpoint);
        let response = self
            .http
            .get(&self.endpoint)
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

        let fx: FxResponse = response
            .json()
            .await
            .map_err(|err| ExchangeError::from_reqwest(UPSTREAM, err))?;

        if fx.result != "success" {
            return Err(ExchangeError::Api {
                upstream: UPSTREAM,
                code: fx.result,
                message: "exchange-rate lookup failed".to_string(),
            });
        }

        fx.rates
            .get("KRW")
            .copied()
            .ok_or(ExchangeError::EmptyResponse("fx rates.KRW"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn usd_krw_reads_the_rate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v6/latest/USD")
            .with_status(200)
            .with_body(r#"{"result":"success","rates":{"USD":1.0,"KRW":1384.2}}"#)
            .create_async()
            .await;

        let client = FxClient::new(format!("{}/v6/latest/USD", server.url()), 5).unwrap();
        let rate = client.usd_krw().await.unwrap();
        assert!((rate - 1384.2).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn non_success_result_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v6/latest/USD")
            .with_status(200)
            .with_body(r#"{"result":"error","error-type":"invalid-key"}"#)
            .create_async()
            .await;

        let client = FxClient::new(format!("{}/v6/latest/USD", server.url()), 5).unwrap();
        let err = client.usd_krw().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Api { .. }));
    }

    #[tokio::test]
    async fn missing_krw_rate_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v6/latest/USD")
            .with_status(200)
            .with_body(r#"{"result":"success","rates":{"USD":1.0}}"#)
            .create_async()
            .await;

        let client = FxClient::new(format!("{}/v6/latest/USD", server.url()), 5).unwrap();
        let err = client.usd_krw().await.unwrap_err();
        assert!(matches!(err, ExchangeError::EmptyResponse(_)));
    }
}
