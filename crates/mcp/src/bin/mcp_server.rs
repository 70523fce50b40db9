use anyhow::Result;
use kc_core::config::CONFIG;
use kc_exchange::ExchangeClients;
use mcp_adapter::KoreanCryptoServer;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let clients = ExchangeClients::from_config(&CONFIG)?;
    KoreanCryptoServer::new(clients).serve_stdio().await
}

/// Logs go to stderr and a rolling file; stdout carries the MCP transport.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mcp-server")
        .build("logs")
        .expect("Failed to create rolling file appender");

    let writer = std::io::stderr
        .with_max_level(tracing::Level::DEBUG)
        .and(file_appender);

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
