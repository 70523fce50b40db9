use anyhow::Result;
use dotenvy::dotenv;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Global configuration accessor to keep the rest of the application stateless.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    AppConfig::load_from_env().expect("failed to load configuration from environment")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_upbit_endpoint")]
    pub upbit_endpoint: String,
    #[serde(default = "default_bithumb_endpoint")]
    pub bithumb_endpoint: String,
    #[serde(default = "default_coingecko_endpoint")]
    pub coingecko_endpoint: String,
    #[serde(default = "default_fx_endpoint")]
    pub fx_endpoint: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upbit_endpoint: default_upbit_endpoint(),
            bithumb_endpoint: default_bithumb_endpoint(),
            coingecko_endpoint: default_coingecko_endpoint(),
            fx_endpoint: default_fx_endpoint(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Build configuration from well-known environment variables.
    ///
    /// Every upstream endpoint can be overridden, which is how the test suite
    /// points the clients at a local mock server.
    pub fn load_from_env() -> Result<Self> {
        preload_env_files();

        let upbit_endpoint =
            env_var_non_empty("UPBIT_ENDPOINT").unwrap_or_else(|_| default_upbit_endpoint());
        let bithumb_endpoint =
            env_var_non_empty("BITHUMB_ENDPOINT").unwrap_or_else(|_| default_bithumb_endpoint());
        let coingecko_endpoint = env_var_non_empty("COINGECKO_ENDPOINT")
            .unwrap_or_else(|_| default_coingecko_endpoint());
        let fx_endpoint =
            env_var_non_empty("FX_ENDPOINT").unwrap_or_else(|_| default_fx_endpoint());

        let http_timeout_secs = match env_var_non_empty("HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|err| anyhow::anyhow!("invalid HTTP_TIMEOUT_SECS {raw:?}: {err}"))?,
            Err(_) => default_http_timeout_secs(),
        };

        Ok(Self {
            upbit_endpoint,
            bithumb_endpoint,
            coingecko_endpoint,
            fx_endpoint,
            http_timeout_secs,
        })
    }
}

fn env_var_non_empty(key: &str) -> Result<String, env::VarError> {
    let value = env::var(key)?;
    if value.trim().is_empty() {
        return Err(env::VarError::NotPresent);
    }
    Ok(value)
}

fn default_upbit_endpoint() -> String {
    "https://api.upbit.com/v1".to_string()
}

fn default_bithumb_endpoint() -> String {
    "https://api.bithumb.com/public".to_string()
}

fn default_coingecko_endpoint() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_fx_endpoint() -> String {
    "https://open.er-api.com/v6/latest/USD".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn preload_env_files() {
    let _ = dotenv();

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidate_files = [manifest_dir.join("../../.env")];

    for path in candidate_files {
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
