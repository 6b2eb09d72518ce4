//! Fetch and extract a single URL without recording anything.

use crate::config::Config;
use crate::dispatch::{CycleReport, Dispatcher};
use crate::extract::ExtractorRegistry;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::TrackedProduct;
use crate::platform::Platform;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ProbeCommand {
    config: Config,
}

impl ProbeCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(
        &self,
        platform: Platform,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let fetcher = HttpFetcher::new(&self.config.fetch_settings())
            .context("Failed to create HTTP client")?;
        self.execute_with(Arc::new(fetcher), platform, url, cancel).await
    }

    /// Probes with a provided fetcher (for testing).
    pub async fn execute_with(
        &self,
        fetcher: Arc<dyn Fetcher>,
        platform: Platform,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let product = TrackedProduct::new("probe", platform, url.trim(), "probe");
        product.validate().map_err(anyhow::Error::msg)?;

        info!("Probing {} ({}, {})", url, platform, product.currency());

        let registry = Arc::new(ExtractorRegistry::new());
        let dispatcher = Dispatcher::new(registry, fetcher, self.config.cycle_settings());
        Ok(dispatcher.run_cycle(&[product], cancel).await)
    }
}
