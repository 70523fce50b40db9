use anyhow::{anyhow, Result};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use crate::compare::{self, CompareRequest, TopMoversRequest};
use crate::market::{self, CandlesRequest, MarketListRequest, OrderbookRequest, PriceRequest};
use crate::premium::{self, KimchiPremiumRequest};
use kc_exchange::ExchangeClients;

/// Stdio MCP server exposing the Korean crypto tool surface.
///
/// Every tool answers with the operation result as pretty-printed JSON text;
/// operation failures become MCP tool errors instead of crashing the server.
#[derive(Clone)]
pub struct KoreanCryptoServer {
    clients: ExchangeClients,
    tool_router: ToolRouter<Self>,
}

fn to_tool_result<T: Serialize>(result: Result<T>) -> CallToolResult {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => CallToolResult::success(vec![Content::text(text)]),
            Err(err) => CallToolResult::error(vec![Content::text(format!(
                "failed to serialize result: {err}"
            ))]),
        },
        Err(err) => CallToolResult::error(vec![Content::text(format!("{err:#}"))]),
    }
}

#[tool_router]
impl KoreanCryptoServer {
    pub fn new(clients: ExchangeClients) -> Self {
        Self {
            clients,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "get_price",
        description = "Current Upbit price for one or more markets, e.g. KRW-BTC or KRW-BTC,KRW-ETH."
    )]
    async fn get_price(
        &self,
        Parameters(request): Parameters<PriceRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            market::fetch_price(&self.clients.upbit, &request).await,
        ))
    }

    #[tool(
        name = "get_markets",
        description = "List Upbit markets for a quote currency (KRW / BTC / USDT)."
    )]
    async fn get_markets(
        &self,
        Parameters(request): Parameters<MarketListRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            market::fetch_markets(&self.clients.upbit, &request).await,
        ))
    }

    #[tool(
        name = "get_orderbook",
        description = "Top ask/bid levels of the Upbit orderbook for a market, e.g. KRW-BTC."
    )]
    async fn get_orderbook(
        &self,
        Parameters(request): Parameters<OrderbookRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            market::fetch_orderbook(&self.clients.upbit, &request).await,
        ))
    }

    #[tool(
        name = "get_candles",
        description = "Upbit OHLC candles. interval: days, weeks, months, minutes/1 .. minutes/240."
    )]
    async fn get_candles(
        &self,
        Parameters(request): Parameters<CandlesRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            market::fetch_candles(&self.clients.upbit, &request).await,
        ))
    }

    #[tool(
        name = "get_kimchi_premium",
        description = "Kimchi premium for a coin: Upbit KRW price vs the global USD price converted at the current FX rate."
    )]
    async fn get_kimchi_premium(
        &self,
        Parameters(request): Parameters<KimchiPremiumRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            premium::fetch_kimchi_premium(&self.clients, &request).await,
        ))
    }

    #[tool(
        name = "compare_exchanges",
        description = "Compare the price of a coin on Upbit and Bithumb."
    )]
    async fn compare_exchanges(
        &self,
        Parameters(request): Parameters<CompareRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            compare::compare_exchanges(&self.clients.upbit, &self.clients.bithumb, &request).await,
        ))
    }

    #[tool(
        name = "get_top_movers",
        description = "Biggest 24h gainers or losers across Upbit KRW markets. direction: up / down."
    )]
    async fn get_top_movers(
        &self,
        Parameters(request): Parameters<TopMoversRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_tool_result(
            compare::fetch_top_movers(&self.clients.upbit, &request).await,
        ))
    }
}

#[tool_handler]
impl ServerHandler for KoreanCryptoServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Korean crypto market data: Upbit prices, markets, orderbooks and candles, \
                 Upbit/Bithumb comparison, kimchi premium and 24h top movers."
                    .into(),
            ),
            ..ServerInfo::default()
        }
    }
}

impl KoreanCryptoServer {
    /// Run the server over stdio transport and wait until the peer disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|err| anyhow!(err))?;

        service.waiting().await.map_err(|err| anyhow!(err))?;

        Ok(())
    }
}
