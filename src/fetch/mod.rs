//! Single-attempt HTTP fetching with status classification.
//!
//! A fetch never retries. It returns the body on 2xx, otherwise a
//! [`FetchError`] saying whether the failure is worth retrying.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use client::HttpFetcher;

/// Desktop Chrome user agent, matching the TLS fingerprint we emulate.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Classified failure of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// HTTP 429 or 503.
    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    /// Timeout, connection failure or truncated body.
    #[error("unreachable: {message}")]
    Unreachable { message: String },

    /// Any other 5xx.
    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },

    /// 4xx other than 429, or a status that is neither success nor error.
    #[error("not found (HTTP {status})")]
    NotFound { status: u16 },
}

/// Maps an HTTP status to success or a classified error.
pub fn classify_status(status: u16) -> Result<(), FetchError> {
    match status {
        200..=299 => Ok(()),
        429 | 503 => Err(FetchError::RateLimited { status }),
        500..=599 => Err(FetchError::ServerError { status }),
        _ => Err(FetchError::NotFound { status }),
    }
}

/// Fetches one URL. Implementations perform exactly one attempt per call.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Request settings fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Proxy URL (e.g., socks5://host:port)
    pub proxy: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert!(classify_status(200).is_ok());
        assert!(classify_status(204).is_ok());
    }

    #[test]
    fn test_classify_rate_limits() {
        assert_eq!(classify_status(429), Err(FetchError::RateLimited { status: 429 }));
        assert_eq!(classify_status(503), Err(FetchError::RateLimited { status: 503 }));
    }

    #[test]
    fn test_classify_errors() {
        assert_eq!(classify_status(404), Err(FetchError::NotFound { status: 404 }));
        assert_eq!(classify_status(410), Err(FetchError::NotFound { status: 410 }));
        assert_eq!(classify_status(500), Err(FetchError::ServerError { status: 500 }));
        assert_eq!(classify_status(502), Err(FetchError::ServerError { status: 502 }));
    }

    #[test]
    fn test_classify_unexpected_status() {
        assert_eq!(classify_status(301), Err(FetchError::NotFound { status: 301 }));
        assert_eq!(classify_status(101), Err(FetchError::NotFound { status: 101 }));
    }

    #[test]
    fn test_error_serializes_with_kind() {
        let json = serde_json::to_string(&FetchError::NotFound { status: 404 }).unwrap();
        assert_eq!(json, r#"{"kind":"not_found","status":404}"#);
    }
}
