use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{status_for, ApiResponse, AppState};
use mcp_adapter::compare::{self, CompareRequest, TopMoversRequest};
use mcp_adapter::market::{self, CandlesRequest, MarketListRequest, OrderbookRequest, PriceRequest};
use mcp_adapter::premium::{self, KimchiPremiumRequest};

/// A2A task envelope: `message.parts[].text` carries the free-form input,
/// `metadata` the structured parameters.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskRequest {
    pub id: Option<String>,
    pub skill_id: Option<String>,
    pub message: TaskMessage,
    pub metadata: Value,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskMessage {
    #[serde(default)]
    pub parts: Vec<TaskPart>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// Agent card served under `/.well-known/agent.json`.
pub async fn agent_card(State(state): State<AppState>) -> impl IntoResponse {
    let base_url = state
        .public_url
        .clone()
        .or_else(|| std::env::var("RAILWAY_PUBLIC_DOMAIN").ok())
        .unwrap_or_else(|| "localhost:8000".to_string());
    let base_url = if base_url.starts_with("http") {
        base_url
    } else {
        format!("https://{base_url}")
    };

    Json(json!({
        "name": "korean-crypto-mcp",
        "description": "Realtime Korean crypto market agent (Upbit, Bithumb, kimchi premium)",
        "url": base_url,
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "streaming": false,
            "pushNotifications": false
        },
        "skills": [
            {
                "id": "get_price",
                "name": "Realtime price",
                "description": "Current Upbit price, e.g. KRW-BTC",
                "inputModes": ["text"],
                "outputModes": ["text"]
            },
            {
                "id": "get_kimchi_premium",
                "name": "Kimchi premium",
                "description": "Upbit vs global reference price premium",
                "inputModes": ["text"],
                "outputModes": ["text"]
            },
            {
                "id": "get_top_movers",
                "name": "Top movers",
                "description": "Biggest 24h gainers and losers",
                "inputModes": ["text"],
                "outputModes": ["text"]
            },
            {
                "id": "compare_exchanges",
                "name": "Exchange comparison",
                "description": "Upbit vs Bithumb price comparison",
                "inputModes": ["text"],
                "outputModes": ["text"]
            }
        ]
    }))
}

/// `POST /tasks/send`: dispatch an A2A task to one of the tool operations and
/// answer with a completed task carrying the result as a text artifact.
pub async fn tasks_send(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> impl IntoResponse {
    let task_id = request.id.clone().unwrap_or_else(|| "task-1".to_string());
    let skill_id = request
        .skill_id
        .clone()
        .unwrap_or_else(|| "get_price".to_string());
    let text = request
        .message
        .parts
        .iter()
        .find(|part| part.kind == "text")
        .map(|part| part.text.trim().to_string())
        .unwrap_or_default();

    match dispatch_skill(&state, &skill_id, &text, &request.metadata).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "id": task_id,
                "status": {"state": "completed"},
                "artifacts": [{
                    "parts": [{"type": "text", "text": result}]
                }]
            })),
        )
            .into_response(),
        Err(DispatchError::UnknownSkill(skill)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Value>::error(format!(
                "Unknown skill: {skill}"
            ))),
        )
            .into_response(),
        Err(DispatchError::Operation(err)) => {
            tracing::warn!(error = ?err, skill = %skill_id, "task dispatch failed");
            (
                status_for(&err),
                Json(ApiResponse::<Value>::error(format!("{err:#}"))),
            )
                .into_response()
        }
    }
}

#[derive(Debug)]
enum DispatchError {
    UnknownSkill(String),
    Operation(anyhow::Error),
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Operation(err)
    }
}

async fn dispatch_skill(
    state: &AppState,
    skill_id: &str,
    text: &str,
    metadata: &Value,
) -> Result<String, DispatchError> {
    let clients = &state.clients;

    let result = match skill_id {
        "get_price" => {
            let request = PriceRequest {
                markets: meta_str(metadata, "market")
                    .or_else(|| non_empty(text))
                    .unwrap_or_else(|| "KRW-BTC".to_string()),
            };
            pretty(market::fetch_price(&clients.upbit, &request).await)?
        }
        "get_markets" => {
            let request = MarketListRequest {
                quote: meta_str(metadata, "quote")
                    .or_else(|| non_empty(text))
                    .unwrap_or_else(|| "KRW".to_string()),
            };
            pretty(market::fetch_markets(&clients.upbit, &request).await)?
        }
        "get_orderbook" => {
            let mut request = OrderbookRequest::default();
            if let Some(market) = meta_str(metadata, "market").or_else(|| non_empty(text)) {
                request.market = market;
            }
            if let Some(depth) = meta_usize(metadata, "depth") {
                request.depth = depth;
            }
            pretty(market::fetch_orderbook(&clients.upbit, &request).await)?
        }
        "get_candles" => {
            let mut request = CandlesRequest::default();
            if let Some(market) = meta_str(metadata, "market") {
                request.market = market;
            }
            if let Some(interval) = meta_str(metadata, "interval") {
                request.interval = interval;
            }
            if let Some(count) = meta_usize(metadata, "count") {
                request.count = count;
            }
            pretty(market::fetch_candles(&clients.upbit, &request).await)?
        }
        "get_kimchi_premium" => {
            let request = KimchiPremiumRequest {
                coin: meta_str(metadata, "coin")
                    .or_else(|| non_empty(text))
                    .unwrap_or_else(|| "BTC".to_string()),
            };
            pretty(premium::fetch_kimchi_premium(clients, &request).await)?
        }
        "compare_exchanges" => {
            let request = CompareRequest {
                coin: meta_str(metadata, "coin")
                    .or_else(|| non_empty(text))
                    .unwrap_or_else(|| "BTC".to_string()),
            };
            pretty(compare::compare_exchanges(&clients.upbit, &clients.bithumb, &request).await)?
        }
        "get_top_movers" => {
            let mut request = TopMoversRequest::default();
            if let Some(direction) = meta_str(metadata, "direction") {
                request.direction = direction.parse().map_err(DispatchError::Operation)?;
            }
            if let Some(limit) = meta_usize(metadata, "limit") {
                request.limit = limit;
            }
            pretty(compare::fetch_top_movers(&clients.upbit, &request).await)?
        }
        other => return Err(DispatchError::UnknownSkill(other.to_string())),
    };

    Ok(result)
}

fn pretty<T: serde::Serialize>(result: Result<T>) -> Result<String, DispatchError> {
    let value = result?;
    serde_json::to_string_pretty(&value)
        .context("failed to serialize task result")
        .map_err(DispatchError::Operation)
}

fn meta_str(metadata: &Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(|value| value.to_string())
}

fn meta_usize(metadata: &Value, key: &str) -> Option<usize> {
    metadata.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_exchange::{BithumbClient, CoinGeckoClient, ExchangeClients, FxClient, UpbitClient};

    fn state_for(upbit_url: &str) -> AppState {
        AppState {
            clients: ExchangeClients {
                upbit: UpbitClient::new(upbit_url, 5).unwrap(),
                bithumb: BithumbClient::new("http://127.0.0.1:1", 1).unwrap(),
                coingecko: CoinGeckoClient::new("http://127.0.0.1:1", 1).unwrap(),
                fx: FxClient::new("http://127.0.0.1:1", 1).unwrap(),
            },
            public_url: None,
        }
    }

    const ETH_TICKER_BODY: &str = r#"[{
        "market":"KRW-ETH","trade_price":5000000.0,"change":"EVEN",
        "signed_change_rate":0.0,"signed_change_price":0.0,
        "high_price":5000000.0,"low_price":5000000.0,
        "acc_trade_price_24h":0.0,"timestamp":1756523700000
    }]"#;

    #[tokio::test]
    async fn unknown_skill_is_rejected_by_dispatch() {
        let state = state_for("http://127.0.0.1:1");
        let err = dispatch_skill(&state, "no_such_skill", "", &Value::Null)
            .await
            .unwrap_err();
        match err {
            DispatchError::UnknownSkill(skill) => assert_eq!(skill, "no_such_skill"),
            DispatchError::Operation(err) => panic!("expected UnknownSkill, got {err:#}"),
        }
    }

    #[tokio::test]
    async fn unknown_skill_answers_400() {
        let state = state_for("http://127.0.0.1:1");
        let request: TaskRequest = serde_json::from_str(
            r#"{"id":"task-9","skillId":"no_such_skill","message":{"parts":[]}}"#,
        )
        .unwrap();

        let response = tasks_send(State(state), Json(request)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metadata_wins_over_message_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ticker?markets=KRW-ETH")
            .with_status(200)
            .with_body(ETH_TICKER_BODY)
            .create_async()
            .await;

        let state = state_for(&server.url());
        let metadata = serde_json::json!({"market": "KRW-ETH"});
        let result = dispatch_skill(&state, "get_price", "KRW-BTC", &metadata)
            .await
            .unwrap();

        assert!(result.contains("KRW-ETH"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn text_part_is_the_fallback_input() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ticker?markets=KRW-ETH")
            .with_status(200)
            .with_body(ETH_TICKER_BODY)
            .create_async()
            .await;

        let state = state_for(&server.url());
        let result = dispatch_skill(&state, "get_price", "KRW-ETH", &Value::Null)
            .await
            .unwrap();

        assert!(result.contains("KRW-ETH"));
        mock.assert_async().await;
    }

    #[test]
    fn task_request_tolerates_missing_fields() {
        let request: TaskRequest = serde_json::from_str("{}").unwrap();
        assert!(request.id.is_none());
        assert!(request.skill_id.is_none());
        assert!(request.message.parts.is_empty());
    }

    #[test]
    fn task_request_reads_text_parts_and_metadata() {
        let request: TaskRequest = serde_json::from_str(
            r#"{
                "id": "task-7",
                "skillId": "get_kimchi_premium",
                "message": {"parts": [{"type": "text", "text": "ETH"}]},
                "metadata": {"count": 20}
            }"#,
        )
        .unwrap();
        assert_eq!(request.id.as_deref(), Some("task-7"));
        assert_eq!(request.skill_id.as_deref(), Some("get_kimchi_premium"));
        assert_eq!(request.message.parts[0].text, "ETH");
        assert_eq!(meta_usize(&request.metadata, "count"), Some(20));
    }
}
