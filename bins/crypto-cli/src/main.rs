use anyhow::Result;
use clap::{Parser, Subcommand};
use kc_core::config::CONFIG;
use kc_exchange::ExchangeClients;
use mcp_adapter::compare::{self, CompareRequest, TopMoversRequest};
use mcp_adapter::market::{self, CandlesRequest, MarketListRequest, OrderbookRequest, PriceRequest};
use mcp_adapter::premium::{self, KimchiPremiumRequest};
use serde_json::to_string_pretty;
use tracing_subscriber::EnvFilter;

/// Smoke-test CLI for the Korean crypto operations, hitting live upstreams.
#[derive(Parser, Debug)]
#[command(name = "crypto-cli", about = "Korean crypto market data CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current Upbit price for one or more markets
    Price {
        /// Market codes, comma-separated, e.g. KRW-BTC,KRW-ETH
        #[arg(long, short = 'm', default_value = "KRW-BTC")]
        markets: String,
    },
    /// List Upbit markets for a quote currency
    Markets {
        /// Quote currency: KRW / BTC / USDT
        #[arg(long, short = 'q', default_value = "KRW")]
        quote: String,
    },
    /// Top ask/bid levels of the Upbit orderbook
    Orderbook {
        /// Market code, e.g. KRW-BTC
        #[arg(long, short = 'm', default_value = "KRW-BTC")]
        market: String,
        /// Price levels per side
        #[arg(long, short = 'd', default_value_t = 5)]
        depth: usize,
    },
    /// Upbit OHLC candles
    Candles {
        /// Market code, e.g. KRW-BTC
        #[arg(long, short = 'm', default_value = "KRW-BTC")]
        market: String,
        /// Interval: days, weeks, months, minutes/1 .. minutes/240
        #[arg(long, short = 'i', default_value = "days")]
        interval: String,
        /// Number of candles
        #[arg(long, short = 'c', default_value_t = 10)]
        count: usize,
    },
    /// Kimchi premium for a coin
    Kimchi {
        /// Coin symbol, e.g. BTC
        #[arg(long, short = 'c', default_value = "BTC")]
        coin: String,
    },
    /// Compare a coin's price on Upbit and Bithumb
    Compare {
        /// Coin symbol, e.g. BTC
        #[arg(long, short = 'c', default_value = "BTC")]
        coin: String,
    },
    /// Biggest 24h gainers or losers across Upbit KRW markets
    TopMovers {
        /// up or down
        #[arg(long, short = 'd', default_value = "up")]
        direction: String,
        #[arg(long, short = 'l', default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let clients = ExchangeClients::from_config(&CONFIG)?;

    match cli.command {
        Command::Price { markets } => {
            let response =
                market::fetch_price(&clients.upbit, &PriceRequest { markets }).await?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::Markets { quote } => {
            let response =
                market::fetch_markets(&clients.upbit, &MarketListRequest { quote }).await?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::Orderbook { market, depth } => {
            let response =
                market::fetch_orderbook(&clients.upbit, &OrderbookRequest { market, depth })
                    .await?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::Candles {
            market,
            interval,
            count,
        } => {
            let response = market::fetch_candles(
                &clients.upbit,
                &CandlesRequest {
                    market,
                    interval,
                    count,
                },
            )
            .await?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::Kimchi { coin } => {
            let response =
                premium::fetch_kimchi_premium(&clients, &KimchiPremiumRequest { coin }).await?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::Compare { coin } => {
            let response = compare::compare_exchanges(
                &clients.upbit,
                &clients.bithumb,
                &CompareRequest { coin },
            )
            .await?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::TopMovers { direction, limit } => {
            let request = TopMoversRequest {
                direction: direction.parse()?,
                limit,
            };
            let response = compare::fetch_top_movers(&clients.upbit, &request).await?;
            println!("{}", to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        tracing::warn!("tracing already initialised");
    }
    Ok(())
}
