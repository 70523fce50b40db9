use anyhow::{ensure, Context, Result};
use kc_exchange::upbit::{self, UpbitClient, UpbitTicker};
use kc_exchange::BithumbClient;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const DEFAULT_COIN: &str = "BTC";
const DEFAULT_MOVER_LIMIT: usize = 10;

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct CompareRequest {
    /// Coin symbol, e.g. BTC.
    pub coin: String,
}

impl Default for CompareRequest {
    fn default() -> Self {
        Self {
            coin: DEFAULT_COIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ExchangeComparison {
    pub coin: String,
    pub upbit_price: f64,
    pub bithumb_price: f64,
    /// upbit − bithumb, in KRW.
    pub spread: f64,
    /// Spread relative to the Bithumb price.
    pub spread_pct: f64,
    /// Venue with the lower price; absent when both prices are equal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheaper: Option<String>,
}

pub fn build_comparison(coin: &str, upbit_price: f64, bithumb_price: f64) -> ExchangeComparison {
    let spread = upbit_price - bithumb_price;
    let cheaper = if spread > 0.0 {
        Some("bithumb".to_string())
    } else if spread < 0.0 {
        Some("upbit".to_string())
    } else {
        None
    };

    ExchangeComparison {
        coin: coin.to_string(),
        upbit_price,
        bithumb_price,
        spread,
        spread_pct: spread / bithumb_price * 100.0,
        cheaper,
    }
}

/// Price of one coin on Upbit and Bithumb, fetched concurrently. Both legs
/// must succeed; the spread is reported even when it is zero.
pub async fn compare_exchanges(
    upbit: &UpbitClient,
    bithumb: &BithumbClient,
    request: &CompareRequest,
) -> Result<ExchangeComparison> {
    let coin = request.coin.trim().to_uppercase();
    ensure!(!coin.is_empty(), "coin must not be empty");

    let (upbit_quote, bithumb_quote) =
        tokio::join!(upbit.fetch_krw_price(&coin), bithumb.fetch_krw_price(&coin));

    let upbit_quote =
        upbit_quote.with_context(|| format!("failed to fetch Upbit price for {coin}"))?;
    let bithumb_quote =
        bithumb_quote.with_context(|| format!("failed to fetch Bithumb price for {coin}"))?;

    Ok(build_comparison(&coin, upbit_quote.price, bithumb_quote.price))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MoverDirection {
    Up,
    Down,
}

impl Default for MoverDirection {
    fn default() -> Self {
        MoverDirection::Up
    }
}

impl FromStr for MoverDirection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "up" => Ok(MoverDirection::Up),
            "down" => Ok(MoverDirection::Down),
            other => anyhow::bail!("direction must be \"up\" or \"down\", got {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct TopMoversRequest {
    /// `up` for the biggest gainers, `down` for the biggest losers.
    pub direction: MoverDirection,
    pub limit: usize,
}

impl Default for TopMoversRequest {
    fn default() -> Self {
        Self {
            direction: MoverDirection::default(),
            limit: DEFAULT_MOVER_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TopMoversResponse {
    pub direction: MoverDirection,
    pub count: usize,
    pub movers: Vec<TopMover>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TopMover {
    pub rank: usize,
    pub market: String,
    pub coin: String,
    pub trade_price: f64,
    pub change: String,
    /// Signed 24h change, in percent.
    pub change_pct: f64,
    pub acc_trade_price_24h: f64,
}

/// Sort tickers by their signed 24h change rate and keep the top `limit`.
pub fn rank_movers(
    tickers: Vec<UpbitTicker>,
    direction: MoverDirection,
    limit: usize,
) -> Vec<TopMover> {
    let mut tickers = tickers;
    tickers.sort_by(|a, b| a.signed_change_rate.total_cmp(&b.signed_change_rate));
    if direction == MoverDirection::Up {
        tickers.reverse();
    }
    tickers.truncate(limit);

    tickers
        .into_iter()
        .enumerate()
        .map(|(index, ticker)| TopMover {
            rank: index + 1,
            coin: ticker
                .market
                .split_once('-')
                .map(|(_, coin)| coin.to_string())
                .unwrap_or_else(|| ticker.market.clone()),
            market: ticker.market,
            trade_price: ticker.trade_price,
            change: ticker.change,
            change_pct: ticker.signed_change_rate * 100.0,
            acc_trade_price_24h: ticker.acc_trade_price_24h,
        })
        .collect()
}

/// Biggest 24h gainers or losers across every Upbit KRW market.
///
/// Upbit caps the ticker endpoint at 100 markets per call, so the full market
/// list is fetched in chunks and merged before ranking.
pub async fn fetch_top_movers(
    client: &UpbitClient,
    request: &TopMoversRequest,
) -> Result<TopMoversResponse> {
    ensure!(request.limit > 0, "limit must be at least 1");

    let krw_markets: Vec<String> = client
        .get_markets()
        .await?
        .into_iter()
        .map(|market| market.market)
        .filter(|code| code.starts_with("KRW-"))
        .collect();
    ensure!(!krw_markets.is_empty(), "no KRW markets returned by Upbit");

    let mut all_tickers = Vec::with_capacity(krw_markets.len());
    for chunk in krw_markets.chunks(upbit::MAX_MARKETS_PER_CALL) {
        let tickers = client.get_tickers(chunk).await?;
        all_tickers.extend(tickers);
    }

    let movers = rank_movers(all_tickers, request.direction, request.limit);
    Ok(TopMoversResponse {
        direction: request.direction,
        count: movers.len(),
        movers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_reports_the_cheaper_venue() {
        let comparison = build_comparison("BTC", 101_000_000.0, 100_000_000.0);
        assert!((comparison.spread - 1_000_000.0).abs() < f64::EPSILON);
        assert!((comparison.spread_pct - 1.0).abs() < 1e-9);
        assert_eq!(comparison.cheaper.as_deref(), Some("bithumb"));

        let comparison = build_comparison("BTC", 99_000_000.0, 100_000_000.0);
        assert_eq!(comparison.cheaper.as_deref(), Some("upbit"));
    }

    #[test]
    fn equal_prices_still_return_both_sides() {
        let comparison = build_comparison("ETH", 5_000_000.0, 5_000_000.0);
        assert!((comparison.upbit_price - 5_000_000.0).abs() < f64::EPSILON);
        assert!((comparison.bithumb_price - 5_000_000.0).abs() < f64::EPSILON);
        assert_eq!(comparison.spread, 0.0);
        assert!(comparison.cheaper.is_none());
    }

    fn ticker(market: &str, rate: f64) -> UpbitTicker {
        UpbitTicker {
            market: market.to_string(),
            trade_price: 100.0,
            change: if rate >= 0.0 { "RISE" } else { "FALL" }.to_string(),
            signed_change_rate: rate,
            signed_change_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            acc_trade_price_24h: 0.0,
            timestamp: 0,
        }
    }

    #[test]
    fn rank_movers_sorts_descending_for_up() {
        let tickers = vec![
            ticker("KRW-A", 0.01),
            ticker("KRW-B", 0.10),
            ticker("KRW-C", -0.05),
            ticker("KRW-D", 0.03),
        ];
        let movers = rank_movers(tickers, MoverDirection::Up, 3);
        assert_eq!(movers.len(), 3);
        let markets: Vec<&str> = movers.iter().map(|m| m.market.as_str()).collect();
        assert_eq!(markets, vec!["KRW-B", "KRW-D", "KRW-A"]);
        assert_eq!(movers[0].rank, 1);
        assert!((movers[0].change_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rank_movers_sorts_ascending_for_down() {
        let tickers = vec![
            ticker("KRW-A", 0.01),
            ticker("KRW-B", -0.10),
            ticker("KRW-C", -0.05),
        ];
        let movers = rank_movers(tickers, MoverDirection::Down, 10);
        let markets: Vec<&str> = movers.iter().map(|m| m.market.as_str()).collect();
        assert_eq!(markets, vec!["KRW-B", "KRW-C", "KRW-A"]);
        assert_eq!(movers[0].coin, "B");
    }

    #[test]
    fn rank_movers_truncates_to_limit() {
        let tickers: Vec<UpbitTicker> = (0..40)
            .map(|i| ticker(&format!("KRW-C{i}"), i as f64 / 100.0))
            .collect();
        let movers = rank_movers(tickers, MoverDirection::Up, 10);
        assert_eq!(movers.len(), 10);
        for pair in movers.windows(2) {
            assert!(pair[0].change_pct >= pair[1].change_pct);
        }
    }

    #[test]
    fn direction_parses_from_strings() {
        assert_eq!("up".parse::<MoverDirection>().unwrap(), MoverDirection::Up);
        assert_eq!(
            " DOWN ".parse::<MoverDirection>().unwrap(),
            MoverDirection::Down
        );
        assert!("sideways".parse::<MoverDirection>().is_err());
    }

    #[tokio::test]
    async fn compare_fails_when_one_venue_is_down() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker?markets=KRW-BTC")
            .with_body(
                r#"[{"market":"KRW-BTC","trade_price":1.0,"change":"EVEN",
                    "signed_change_rate":0.0,"signed_change_price":0.0,
                    "high_price":1.0,"low_price":1.0,
                    "acc_trade_price_24h":0.0,"timestamp":0}]"#,
            )
            .create_async()
            .await;

        let upbit = UpbitClient::new(server.url(), 5).unwrap();
        let bithumb = BithumbClient::new("http://127.0.0.1:1", 1).unwrap();
        let err = compare_exchanges(&upbit, &bithumb, &CompareRequest::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Bithumb"));
    }
}
