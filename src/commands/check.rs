//! One price-check cycle over the configured catalog.

use crate::config::Config;
use crate::dispatch::{CycleReport, Dispatcher};
use crate::extract::ExtractorRegistry;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::TrackedProduct;
use crate::sink::{LogNotifier, ObservationSink};
use crate::store::{JsonlStore, ObservationStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs a cycle and records the observations.
pub struct CheckCommand {
    config: Config,
}

impl CheckCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs one cycle against the live storefronts and the configured store.
    pub async fn execute(
        &self,
        only: &[String],
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let fetcher = HttpFetcher::new(&self.config.fetch_settings())
            .context("Failed to create HTTP client")?;
        let store = JsonlStore::new(&self.config.store_path);

        self.execute_with(Arc::new(fetcher), Arc::new(store), only, cancel).await
    }

    /// Runs one cycle with the given collaborators (for testing).
    pub async fn execute_with(
        &self,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn ObservationStore>,
        only: &[String],
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let products = select_products(&self.config, only)?;
        info!("Checking {} products", products.len());

        let dispatcher = build_dispatcher(&self.config, fetcher, store);
        Ok(dispatcher.run_cycle(&products, cancel).await)
    }
}

/// Wires registry, fetcher and sink into a dispatcher from config.
pub(crate) fn build_dispatcher(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ObservationStore>,
) -> Dispatcher {
    let sink = ObservationSink::new(store).with_notifier(Arc::new(LogNotifier));
    Dispatcher::new(Arc::new(ExtractorRegistry::new()), fetcher, config.cycle_settings())
        .with_sink(Arc::new(sink))
}

/// Catalog products, optionally narrowed to the given ids.
pub(crate) fn select_products(config: &Config, only: &[String]) -> Result<Vec<TrackedProduct>> {
    let products = config.tracked_products();
    if products.is_empty() {
        anyhow::bail!("No products configured. Add [[products]] entries to your config file.");
    }

    if only.is_empty() {
        return Ok(products);
    }

    let known = |id: &String| products.iter().any(|p| p.id.as_str() == id.as_str());
    if let Some(unknown) = only.iter().find(|id| !known(*id)) {
        anyhow::bail!("Unknown product id: {}", unknown);
    }

    Ok(products.into_iter().filter(|p| only.iter().any(|id| id == p.id.as_str())).collect())
}
