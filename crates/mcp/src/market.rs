use anyhow::{ensure, Result};
use chrono::Utc;
use kc_core::types::MarketCode;
use kc_exchange::upbit::{self, UpbitClient, UpbitTicker};
use rmcp::schemars;
use serde::{Deserialize, Serialize};

const DEFAULT_MARKET: &str = "KRW-BTC";
const DEFAULT_QUOTE: &str = "KRW";
const DEFAULT_ORDERBOOK_DEPTH: usize = 5;
const DEFAULT_CANDLE_COUNT: usize = 10;
const DEFAULT_CANDLE_INTERVAL: &str = "days";

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct PriceRequest {
    /// One or more market codes, comma-separated, e.g. `KRW-BTC,KRW-ETH`.
    pub markets: String,
}

impl Default for PriceRequest {
    fn default() -> Self {
        Self {
            markets: DEFAULT_MARKET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct PriceResponse {
    pub timestamp: String,
    pub prices: Vec<MarketSnapshot>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct MarketSnapshot {
    pub market: String,
    pub trade_price: f64,
    /// RISE / EVEN / FALL, verbatim from Upbit.
    pub change: String,
    pub signed_change_rate_pct: f64,
    pub signed_change_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub acc_trade_price_24h: f64,
    pub timestamp: i64,
}

impl From<UpbitTicker> for MarketSnapshot {
    fn from(ticker: UpbitTicker) -> Self {
        Self {
            market: ticker.market,
            trade_price: ticker.trade_price,
            change: ticker.change,
            signed_change_rate_pct: ticker.signed_change_rate * 100.0,
            signed_change_price: ticker.signed_change_price,
            high_price: ticker.high_price,
            low_price: ticker.low_price,
            acc_trade_price_24h: ticker.acc_trade_price_24h,
            timestamp: ticker.timestamp,
        }
    }
}

/// Current ticker snapshots for a comma-separated market list.
pub async fn fetch_price(client: &UpbitClient, request: &PriceRequest) -> Result<PriceResponse> {
    let markets = parse_market_list(&request.markets)?;
    let tickers = client.get_tickers(&markets).await?;
    Ok(PriceResponse {
        timestamp: Utc::now().to_rfc3339(),
        prices: tickers.into_iter().map(MarketSnapshot::from).collect(),
    })
}

fn parse_market_list(raw: &str) -> Result<Vec<String>> {
    let markets: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            MarketCode::parse(part)
                .map(|code| code.to_string())
                .ok_or_else(|| anyhow::anyhow!("invalid market code: {part:?}"))
        })
        .collect::<Result<_>>()?;

    ensure!(!markets.is_empty(), "markets must not be empty");
    ensure!(
        markets.len() <= upbit::MAX_MARKETS_PER_CALL,
        "at most {} markets per request",
        upbit::MAX_MARKETS_PER_CALL
    );
    Ok(markets)
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct MarketListRequest {
    /// Quote currency to filter by: KRW / BTC / USDT.
    pub quote: String,
}

impl Default for MarketListRequest {
    fn default() -> Self {
        Self {
            quote: DEFAULT_QUOTE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct MarketListResponse {
    pub quote: String,
    pub count: usize,
    pub coins: Vec<String>,
}

/// Upbit markets for one quote currency, reduced to the coin symbols.
pub async fn fetch_markets(
    client: &UpbitClient,
    request: &MarketListRequest,
) -> Result<MarketListResponse> {
    let quote = request.quote.trim().to_uppercase();
    ensure!(!quote.is_empty(), "quote must not be empty");

    let prefix = format!("{quote}-");
    let coins: Vec<String> = client
        .get_markets()
        .await?
        .into_iter()
        .filter_map(|market| {
            market
                .market
                .strip_prefix(&prefix)
                .map(|coin| coin.to_string())
        })
        .collect();

    Ok(MarketListResponse {
        quote,
        count: coins.len(),
        coins,
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct OrderbookRequest {
    /// Market code, e.g. `KRW-BTC`.
    pub market: String,
    /// Number of price levels per side.
    pub depth: usize,
}

impl Default for OrderbookRequest {
    fn default() -> Self {
        Self {
            market: DEFAULT_MARKET.to_string(),
            depth: DEFAULT_ORDERBOOK_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct OrderbookResponse {
    pub market: String,
    pub timestamp: i64,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    pub asks: Vec<OrderbookLevel>,
    pub bids: Vec<OrderbookLevel>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct OrderbookLevel {
    pub price: f64,
    pub size: f64,
}

/// Top `depth` ask/bid levels for a market.
pub async fn fetch_orderbook(
    client: &UpbitClient,
    request: &OrderbookRequest,
) -> Result<OrderbookResponse> {
    let market = parse_single_market(&request.market)?;
    ensure!(request.depth > 0, "depth must be at least 1");

    let orderbook = client.get_orderbook(&market).await?;
    let units = &orderbook.orderbook_units[..request.depth.min(orderbook.orderbook_units.len())];

    Ok(OrderbookResponse {
        market: orderbook.market.clone(),
        timestamp: orderbook.timestamp,
        total_ask_size: orderbook.total_ask_size,
        total_bid_size: orderbook.total_bid_size,
        asks: units
            .iter()
            .map(|unit| OrderbookLevel {
                price: unit.ask_price,
                size: unit.ask_size,
            })
            .collect(),
        bids: units
            .iter()
            .map(|unit| OrderbookLevel {
                price: unit.bid_price,
                size: unit.bid_size,
            })
            .collect(),
    })
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct CandlesRequest {
    /// Market code, e.g. `KRW-BTC`.
    pub market: String,
    /// Candle interval: days, weeks, months, minutes/1 .. minutes/240.
    pub interval: String,
    pub count: usize,
}

impl Default for CandlesRequest {
    fn default() -> Self {
        Self {
            market: DEFAULT_MARKET.to_string(),
            interval: DEFAULT_CANDLE_INTERVAL.to_string(),
            count: DEFAULT_CANDLE_COUNT,
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct CandlesResponse {
    pub market: String,
    pub interval: String,
    pub candles: Vec<CandleSummary>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct CandleSummary {
    /// Candle open time in KST, as Upbit reports it.
    pub date_time_kst: String,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
}

/// OHLC candles for a market.
pub async fn fetch_candles(
    client: &UpbitClient,
    request: &CandlesRequest,
) -> Result<CandlesResponse> {
    let market = parse_single_market(&request.market)?;
    ensure!(
        upbit::is_valid_interval(&request.interval),
        "invalid interval: {:?}",
        request.interval
    );
    ensure!(request.count > 0, "count must be at least 1");

    let candles = client
        .get_candles(&market, &request.interval, request.count)
        .await?;

    Ok(CandlesResponse {
        market: market.to_string(),
        interval: request.interval.clone(),
        candles: candles
            .into_iter()
            .map(|candle| CandleSummary {
                date_time_kst: candle.candle_date_time_kst,
                opening_price: candle.opening_price,
                high_price: candle.high_price,
                low_price: candle.low_price,
                trade_price: candle.trade_price,
            })
            .collect(),
    })
}

fn parse_single_market(raw: &str) -> Result<MarketCode> {
    MarketCode::parse(raw).ok_or_else(|| anyhow::anyhow!("invalid market code: {raw:?}"))
}
