//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::dispatch::CycleSettings;
use crate::fetch::{FetchSettings, DEFAULT_USER_AGENT};
use crate::models::{ProductId, TrackedProduct};
use crate::platform::Platform;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Products fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Attempts per product per cycle, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Random +/- spread applied to each backoff delay
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    /// Tighter attempt budget for generic 5xx responses
    #[serde(default)]
    pub server_error_max_attempts: Option<u32>,

    /// Wall-clock budget for a whole cycle
    #[serde(default)]
    pub cycle_timeout_secs: Option<u64>,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// JSON-lines history file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Tracked products
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

/// A `[[products]]` catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub id: String,
    pub platform: Platform,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_price: Option<Decimal>,
    /// When the product was added; defaults to load time.
    #[serde(default)]
    pub added: Option<DateTime<Utc>>,
}

impl ProductEntry {
    pub fn to_tracked(&self) -> TrackedProduct {
        TrackedProduct {
            id: ProductId::new(self.id.clone()),
            platform: self.platform,
            url: self.url.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            created_at: self.added.unwrap_or_else(Utc::now),
            target_price: self.target_price,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_backoff_jitter_ms() -> u64 {
    1000
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pricewatch")
        .join("history.jsonl")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            server_error_max_attempts: None,
            cycle_timeout_secs: None,
            proxy: None,
            store_path: default_store_path(),
            format: OutputFormat::Table,
            products: Vec::new(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("pricewatch.toml");
        if local_config.exists() {
            debug!("Found pricewatch.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("pricewatch").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides. Unparseable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(proxy) = std::env::var("PRICEWATCH_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(concurrency) = std::env::var("PRICEWATCH_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }

        if let Ok(user_agent) = std::env::var("PRICEWATCH_USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Ok(timeout) = std::env::var("PRICEWATCH_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.timeout_secs = t;
            }
        }

        if let Ok(store) = std::env::var("PRICEWATCH_STORE") {
            self.store_path = PathBuf::from(store);
        }

        self
    }

    /// Catalog entries as tracked products.
    pub fn tracked_products(&self) -> Vec<TrackedProduct> {
        self.products.iter().map(ProductEntry::to_tracked).collect()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            proxy: self.proxy.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_cap_ms),
            jitter: Duration::from_millis(self.backoff_jitter_ms),
            server_error_max_attempts: self.server_error_max_attempts,
        }
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            concurrency: self.concurrency.max(1),
            retry: self.retry_policy(),
            cycle_timeout: self.cycle_timeout_secs.map(Duration::from_secs),
            grace_period: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff_base_ms, 1000);
        assert_eq!(config.backoff_cap_ms, 30_000);
        assert_eq!(config.backoff_jitter_ms, 1000);
        assert_eq!(config.format, OutputFormat::Table);
        assert!(config.proxy.is_none());
        assert!(config.server_error_max_attempts.is_none());
        assert!(config.cycle_timeout_secs.is_none());
        assert!(config.products.is_empty());
        assert!(config.store_path.ends_with("pricewatch/history.jsonl"));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);

        let err = "invalid".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("Unknown format"));
        assert!(err.contains("table, json, markdown, csv"));
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_config_from_toml_with_products() {
        let toml = r#"
            concurrency = 8
            max_attempts = 3
            format = "json"
            server_error_max_attempts = 2
            cycle_timeout_secs = 600

            [[products]]
            id = "mouse"
            platform = "amazon"
            url = "https://www.amazon.de/dp/B07W6JN5VM"
            name = "Wireless Mouse"
            target_price = 24.5

            [[products]]
            id = "camera"
            platform = "ebay"
            url = "https://www.ebay.com/itm/1234"
            added = "2024-03-01T12:00:00Z"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.server_error_max_attempts, Some(2));
        assert_eq!(config.products.len(), 2);

        let products = config.tracked_products();
        assert_eq!(products[0].id.as_str(), "mouse");
        assert_eq!(products[0].platform, Platform::Amazon);
        assert_eq!(products[0].target_price, Some(Decimal::new(245, 1)));
        assert_eq!(products[0].currency(), "EUR");
        // Name falls back to the id.
        assert_eq!(products[1].name, "camera");
        assert_eq!(products[1].created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        let toml = r#"
            [[products]]
            id = "x"
            platform = "walmart"
            url = "https://walmart.com/x"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_engine_settings() {
        let config = Config {
            max_attempts: 0,
            backoff_base_ms: 250,
            cycle_timeout_secs: Some(60),
            proxy: Some("socks5://localhost:1080".to_string()),
            ..Config::default()
        };

        let retry = config.retry_policy();
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.base_delay, Duration::from_millis(250));

        let cycle = config.cycle_settings();
        assert_eq!(cycle.cycle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(cycle.grace_period, Duration::from_secs(30));

        let fetch = config.fetch_settings();
        assert_eq!(fetch.proxy.as_deref(), Some("socks5://localhost:1080"));
        assert_eq!(fetch.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            concurrency = 2
            store_path = "/tmp/pw.jsonl"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.store_path, PathBuf::from("/tmp/pw.jsonl"));
    }

    #[test]
    fn test_config_from_file_not_found() {
        let result = Config::from_file("/nonexistent/path/config.toml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_config_from_file_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = 7").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.max_attempts, 7);
    }

    #[test]
    fn test_config_with_env() {
        let keys = [
            "PRICEWATCH_PROXY",
            "PRICEWATCH_CONCURRENCY",
            "PRICEWATCH_TIMEOUT",
            "PRICEWATCH_STORE",
        ];
        let saved: Vec<_> = keys.iter().map(|k| std::env::var(k).ok()).collect();

        std::env::set_var("PRICEWATCH_PROXY", "http://proxy:8080");
        std::env::set_var("PRICEWATCH_CONCURRENCY", "9");
        std::env::set_var("PRICEWATCH_TIMEOUT", "not-a-number");
        std::env::set_var("PRICEWATCH_STORE", "/data/prices.jsonl");

        let config = Config::new().with_env();
        assert_eq!(config.proxy, Some("http://proxy:8080".to_string()));
        assert_eq!(config.concurrency, 9);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.store_path, PathBuf::from("/data/prices.jsonl"));

        for (key, value) in keys.iter().zip(saved) {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
