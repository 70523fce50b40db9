use anyhow::{ensure, Context, Result};
use kc_exchange::{ExchangeClients, FALLBACK_USD_KRW};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_COIN: &str = "BTC";

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct KimchiPremiumRequest {
    /// Coin symbol, e.g. BTC.
    pub coin: String,
}

impl Default for KimchiPremiumRequest {
    fn default() -> Self {
        Self {
            coin: DEFAULT_COIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct KimchiPremium {
    pub coin: String,
    /// Upbit KRW price.
    pub krw_price: f64,
    /// CoinGecko USD reference price.
    pub global_price_usd: f64,
    pub usd_krw_rate: f64,
    /// Reference price converted to KRW.
    pub global_price_krw: f64,
    pub premium_pct: f64,
    pub assessment: PremiumAssessment,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PremiumAssessment {
    StrongPremium,
    ModeratePremium,
    Neutral,
    Discount,
}

/// premium = (korean − global) / global × 100
pub fn premium_pct(krw_price: f64, global_price_krw: f64) -> f64 {
    (krw_price - global_price_krw) / global_price_krw * 100.0
}

pub fn classify_premium(pct: f64) -> PremiumAssessment {
    if pct > 5.0 {
        PremiumAssessment::StrongPremium
    } else if pct > 2.0 {
        PremiumAssessment::ModeratePremium
    } else if pct < -1.0 {
        PremiumAssessment::Discount
    } else {
        PremiumAssessment::Neutral
    }
}

/// Kimchi premium for one coin: Upbit KRW price against the CoinGecko USD
/// price converted at the current USD/KRW rate.
///
/// The three upstream calls run concurrently. A failed Upbit or CoinGecko leg
/// fails the whole operation; a failed FX leg falls back to
/// [`FALLBACK_USD_KRW`] so a flaky rate feed does not take the tool down.
pub async fn fetch_kimchi_premium(
    clients: &ExchangeClients,
    request: &KimchiPremiumRequest,
) -> Result<KimchiPremium> {
    let coin = request.coin.trim().to_uppercase();
    ensure!(!coin.is_empty(), "coin must not be empty");

    let global_leg = async {
        let id = clients.coingecko.resolve_id(&coin).await?;
        clients.coingecko.simple_price_usd(&id).await
    };

    let (quote, global_price_usd, fx_rate) = tokio::join!(
        clients.upbit.fetch_krw_price(&coin),
        global_leg,
        clients.fx.usd_krw(),
    );

    let quote = quote.with_context(|| format!("failed to fetch Upbit price for {coin}"))?;
    let global_price_usd =
        global_price_usd.with_context(|| format!("failed to fetch global price for {coin}"))?;
    let usd_krw_rate = match fx_rate {
        Ok(rate) => rate,
        Err(err) => {
            warn!(error = ?err, "fx rate unavailable, using fallback {FALLBACK_USD_KRW}");
            FALLBACK_USD_KRW
        }
    };

    let global_price_krw = global_price_usd * usd_krw_rate;
    let pct = premium_pct(quote.price, global_price_krw);

    Ok(KimchiPremium {
        coin,
        krw_price: quote.price,
        global_price_usd,
        usd_krw_rate,
        global_price_krw,
        premium_pct: pct,
        assessment: classify_premium(pct),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_exchange::{BithumbClient, CoinGeckoClient, FxClient, UpbitClient};

    #[test]
    fn premium_formula_holds() {
        let cases = [
            (150_000_000.0, 147_000_000.0),
            (100.0, 100.0),
            (95.0, 100.0),
            (1.0, 3.0),
        ];
        for (krw, global) in cases {
            let expected = (krw - global) / global * 100.0;
            assert!((premium_pct(krw, global) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classify_premium(5.01), PremiumAssessment::StrongPremium);
        assert_eq!(classify_premium(5.0), PremiumAssessment::ModeratePremium);
        assert_eq!(classify_premium(2.5), PremiumAssessment::ModeratePremium);
        assert_eq!(classify_premium(2.0), PremiumAssessment::Neutral);
        assert_eq!(classify_premium(0.0), PremiumAssessment::Neutral);
        assert_eq!(classify_premium(-1.0), PremiumAssessment::Neutral);
        assert_eq!(classify_premium(-1.01), PremiumAssessment::Discount);
    }

    fn clients_for(upbit: &str, coingecko: &str, fx: &str) -> ExchangeClients {
        ExchangeClients {
            upbit: UpbitClient::new(upbit, 5).unwrap(),
            bithumb: BithumbClient::new("http://127.0.0.1:1", 1).unwrap(),
            coingecko: CoinGeckoClient::new(coingecko, 5).unwrap(),
            fx: FxClient::new(format!("{fx}/v6/latest/USD"), 5).unwrap(),
        }
    }

    fn upbit_ticker_body(price: f64) -> String {
        format!(
            r#"[{{"market":"KRW-BTC","trade_price":{price},"change":"RISE",
                "signed_change_rate":0.01,"signed_change_price":1.0,
                "high_price":{price},"low_price":{price},
                "acc_trade_price_24h":1.0,"timestamp":1756523700000}}]"#
        )
    }

    #[tokio::test]
    async fn computes_premium_from_three_upstreams() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker?markets=KRW-BTC")
            .with_body(upbit_ticker_body(151_200_000.0))
            .create_async()
            .await;
        server
            .mock("GET", "/simple/price?ids=bitcoin&vs_currencies=usd")
            .with_body(r#"{"bitcoin":{"usd":100000.0}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v6/latest/USD")
            .with_body(r#"{"result":"success","rates":{"KRW":1400.0}}"#)
            .create_async()
            .await;

        let clients = clients_for(&server.url(), &server.url(), &server.url());
        let premium = fetch_kimchi_premium(&clients, &KimchiPremiumRequest::default())
            .await
            .unwrap();

        // global = 100_000 * 1400 = 140_000_000 KRW, premium = 8%
        assert!((premium.global_price_krw - 140_000_000.0).abs() < 1e-6);
        assert!((premium.premium_pct - 8.0).abs() < 1e-9);
        assert_eq!(premium.assessment, PremiumAssessment::StrongPremium);
    }

    #[tokio::test]
    async fn fx_failure_falls_back_to_default_rate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker?markets=KRW-BTC")
            .with_body(upbit_ticker_body(135_000_000.0))
            .create_async()
            .await;
        server
            .mock("GET", "/simple/price?ids=bitcoin&vs_currencies=usd")
            .with_body(r#"{"bitcoin":{"usd":100000.0}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v6/latest/USD")
            .with_status(503)
            .create_async()
            .await;

        let clients = clients_for(&server.url(), &server.url(), &server.url());
        let premium = fetch_kimchi_premium(&clients, &KimchiPremiumRequest::default())
            .await
            .unwrap();

        assert!((premium.usd_krw_rate - FALLBACK_USD_KRW).abs() < f64::EPSILON);
        // 135_000_000 vs 100_000 * 1350 -> premium exactly 0
        assert!(premium.premium_pct.abs() < 1e-9);
        assert_eq!(premium.assessment, PremiumAssessment::Neutral);
    }

    #[tokio::test]
    async fn unknown_coin_fails_the_operation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker?markets=KRW-ZZZZ")
            .with_status(404)
            .with_body(r#"{"error":{"name":404,"message":"Code not found"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/search?query=ZZZZ")
            .with_body(r#"{"coins":[]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v6/latest/USD")
            .with_body(r#"{"result":"success","rates":{"KRW":1400.0}}"#)
            .create_async()
            .await;

        let clients = clients_for(&server.url(), &server.url(), &server.url());
        let err = fetch_kimchi_premium(
            &clients,
            &KimchiPremiumRequest {
                coin: "zzzz".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("ZZZZ"), "unexpected error: {err:#}");
    }
}
