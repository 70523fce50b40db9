use std::fs;
use std::sync::OnceLock;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use kc_core::config::CONFIG;
use kc_exchange::{ExchangeClients, ExchangeError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

mod a2a;
mod config;

use config::load_app_config;
use mcp_adapter::compare::{self, CompareRequest, TopMoversRequest};
use mcp_adapter::market::{self, CandlesRequest, MarketListRequest, OrderbookRequest, PriceRequest};
use mcp_adapter::premium::{self, KimchiPremiumRequest};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const TOOL_NAMES: &[&str] = &[
    "get_price",
    "get_markets",
    "get_orderbook",
    "get_candles",
    "get_kimchi_premium",
    "compare_exchanges",
    "get_top_movers",
];

#[derive(Clone)]
struct AppState {
    clients: ExchangeClients,
    public_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Map an operation failure onto an HTTP status. Upstream failures carry an
/// `ExchangeError` somewhere in their chain; everything else is treated as
/// input validation.
fn status_for(err: &anyhow::Error) -> StatusCode {
    let exchange_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ExchangeError>());

    match exchange_err {
        Some(ExchangeError::NotFound(_)) => StatusCode::NOT_FOUND,
        Some(ExchangeError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        Some(_) => StatusCode::BAD_GATEWAY,
        None => StatusCode::BAD_REQUEST,
    }
}

fn respond<T: Serialize>(result: anyhow::Result<T>) -> impl IntoResponse {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(err) => {
            tracing::warn!(error = ?err, "request failed");
            (
                status_for(&err),
                Json(ApiResponse::error(format!("{err:#}"))),
            )
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_descriptor))
        .route("/health", get(health))
        .route("/price/:market", get(get_price))
        .route("/markets", get(get_markets))
        .route("/orderbook/:market", get(get_orderbook))
        .route("/candles/:market", get(get_candles))
        .route("/kimchi/:coin", get(get_kimchi_premium))
        .route("/compare/:coin", get(compare_exchanges))
        .route("/top-movers", get(get_top_movers))
        .route("/.well-known/agent.json", get(a2a::agent_card))
        .route("/tasks/send", post(a2a::tasks_send))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = load_app_config().unwrap_or_else(|err| {
        tracing::warn!("failed to load config: {err:?}, using defaults");
        Default::default()
    });

    let clients = ExchangeClients::from_config(&CONFIG)?;
    let app_state = AppState {
        clients,
        public_url: settings.public_url(),
    };

    let bind_addr = settings
        .bind_addr()
        .unwrap_or_else(|_| "0.0.0.0:8000".parse().expect("invalid default addr"));

    let router = api_routes()
        .with_state(app_state)
        .layer(
            CorsLayer::new()
                .allow_methods(Any)
                .allow_headers(Any)
                .allow_origin(Any),
        );

    info!("Starting API server on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    let log_dir = std::path::Path::new("logs");
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log directory {log_dir:?}: {err}");
    }

    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(log_dir, "api-server.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let env_filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    let fmt_stdout = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
    let fmt_file = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_stdout)
        .with(fmt_file);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing already initialised");
    }
}

async fn service_descriptor() -> impl IntoResponse {
    Json(json!({
        "name": "korean-crypto-mcp",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "tools": TOOL_NAMES,
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct MarketsQuery {
    quote: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderbookQuery {
    depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CandlesQuery {
    interval: Option<String>,
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TopMoversQuery {
    direction: Option<String>,
    limit: Option<usize>,
}

async fn get_price(State(state): State<AppState>, Path(market): Path<String>) -> impl IntoResponse {
    let request = PriceRequest { markets: market };
    respond(market::fetch_price(&state.clients.upbit, &request).await)
}

async fn get_markets(
    State(state): State<AppState>,
    Query(query): Query<MarketsQuery>,
) -> impl IntoResponse {
    let mut request = MarketListRequest::default();
    if let Some(quote) = query.quote {
        request.quote = quote;
    }
    respond(market::fetch_markets(&state.clients.upbit, &request).await)
}

async fn get_orderbook(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(query): Query<OrderbookQuery>,
) -> impl IntoResponse {
    let mut request = OrderbookRequest {
        market,
        ..Default::default()
    };
    if let Some(depth) = query.depth {
        request.depth = depth;
    }
    respond(market::fetch_orderbook(&state.clients.upbit, &request).await)
}

async fn get_candles(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(query): Query<CandlesQuery>,
) -> impl IntoResponse {
    let mut request = CandlesRequest {
        market,
        ..Default::default()
    };
    if let Some(interval) = query.interval {
        request.interval = interval;
    }
    if let Some(count) = query.count {
        request.count = count;
    }
    respond(market::fetch_candles(&state.clients.upbit, &request).await)
}

async fn get_kimchi_premium(
    State(state): State<AppState>,
    Path(coin): Path<String>,
) -> impl IntoResponse {
    let request = KimchiPremiumRequest { coin };
    respond(premium::fetch_kimchi_premium(&state.clients, &request).await)
}

async fn compare_exchanges(
    State(state): State<AppState>,
    Path(coin): Path<String>,
) -> impl IntoResponse {
    let request = CompareRequest { coin };
    respond(
        compare::compare_exchanges(&state.clients.upbit, &state.clients.bithumb, &request).await,
    )
}

async fn get_top_movers(
    State(state): State<AppState>,
    Query(query): Query<TopMoversQuery>,
) -> impl IntoResponse {
    let mut request = TopMoversRequest::default();
    if let Some(direction) = query.direction {
        match direction.parse() {
            Ok(direction) => request.direction = direction,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::error(format!("{err:#}"))),
                )
                    .into_response()
            }
        }
    }
    if let Some(limit) = query.limit {
        request.limit = limit;
    }
    respond(compare::fetch_top_movers(&state.clients.upbit, &request).await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = anyhow::Error::from(ExchangeError::NotFound("KRW-NOPE".into()));
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn timeout_maps_to_504_even_under_context() {
        let err = anyhow::Error::from(ExchangeError::Timeout { upstream: "upbit" })
            .context("failed to fetch Upbit price for BTC");
        assert_eq!(status_for(&err), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn other_upstream_failures_map_to_502() {
        let err = anyhow::Error::from(ExchangeError::Api {
            upstream: "bithumb",
            code: "5500".into(),
            message: "Internal Error".into(),
        });
        assert_eq!(status_for(&err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn validation_errors_map_to_400() {
        let err = anyhow::anyhow!("invalid market code: \"BTC\"");
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }
}
