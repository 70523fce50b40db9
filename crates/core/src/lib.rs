pub mod config;
pub mod types;

pub use config::{AppConfig, CONFIG};
pub use types::{Currency, MarketCode, PriceQuote};
