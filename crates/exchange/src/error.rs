use reqwest::StatusCode;
use thiserror::Error;

/// Uniform failure type shared by every upstream client.
///
/// Transport layers map these onto HTTP status codes, so the variants stay
/// coarse: what the caller asked for does not exist, the upstream timed out,
/// the upstream is down, or the upstream answered something we cannot use.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{upstream} request timed out")]
    Timeout { upstream: &'static str },
    #[error("{upstream} unavailable: {message}")]
    Unavailable {
        upstream: &'static str,
        message: String,
    },
    #[error("{upstream} returned http {status}: {body}")]
    Status {
        upstream: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{upstream} api error {code}: {message}")]
    Api {
        upstream: &'static str,
        code: String,
        message: String,
    },
    #[error("failed to decode {upstream} response: {message}")]
    Decode {
        upstream: &'static str,
        message: String,
    },
    #[error("empty response from {0}")]
    EmptyResponse(&'static str),
}

impl ExchangeError {
    /// Classify a reqwest error into the uniform variants.
    pub fn from_reqwest(upstream: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout { upstream }
        } else if err.is_decode() {
            ExchangeError::Decode {
                upstream,
                message: err.to_string(),
            }
        } else {
            ExchangeError::Unavailable {
                upstream,
                message: err.to_string(),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExchangeError::NotFound(_))
    }
}
