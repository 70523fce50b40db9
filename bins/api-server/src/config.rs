use std::net::SocketAddr;

use ::config::{Config, ConfigError as BuilderError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public base URL advertised on the agent card, e.g. behind a PaaS proxy.
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidAddr(String),
    #[error("configuration load failed: {0}")]
    Load(#[from] BuilderError),
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl AppConfig {
    /// Bind address: the `PORT` env var (PaaS convention) wins over the
    /// configured bind, which falls back to 0.0.0.0:8000.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        if let Ok(port) = std::env::var("PORT") {
            let candidate = format!("0.0.0.0:{port}");
            return candidate
                .parse()
                .map_err(|_| ConfigError::InvalidAddr(candidate));
        }

        if let Some(server) = &self.server {
            return server
                .bind
                .parse()
                .map_err(|_| ConfigError::InvalidAddr(server.bind.clone()));
        }

        let fallback = default_bind();
        fallback
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(fallback))
    }

    pub fn public_url(&self) -> Option<String> {
        self.server
            .as_ref()
            .and_then(|server| server.public_url.clone())
    }
}

pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(DEFAULT_CONFIG_PATH).required(false));

    builder = builder.add_source(Environment::with_prefix("KRCRYPTO").separator("__"));

    let config: AppConfig = builder.build()?.try_deserialize()?;

    Ok(config)
}
