//! Repeated cycles on a fixed interval until cancelled.

use super::check::{build_dispatcher, select_products};
use crate::config::Config;
use crate::dispatch::CycleReport;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::store::{JsonlStore, ObservationStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct WatchCommand {
    config: Config,
    interval: Duration,
}

impl WatchCommand {
    pub fn new(config: Config, interval: Duration) -> Self {
        Self { config, interval }
    }

    /// Runs cycles until `cancel` fires, handing each report to `on_report`.
    /// Returns the number of completed cycles.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        on_report: impl FnMut(&CycleReport),
    ) -> Result<usize> {
        let fetcher = HttpFetcher::new(&self.config.fetch_settings())
            .context("Failed to create HTTP client")?;
        let store = JsonlStore::new(&self.config.store_path);

        self.execute_with(Arc::new(fetcher), Arc::new(store), cancel, on_report).await
    }

    /// Runs the watch loop with the given collaborators (for testing).
    pub async fn execute_with(
        &self,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn ObservationStore>,
        cancel: &CancellationToken,
        mut on_report: impl FnMut(&CycleReport),
    ) -> Result<usize> {
        let products = select_products(&self.config, &[])?;
        let dispatcher = build_dispatcher(&self.config, fetcher, store);
        let mut cycles = 0;

        while !cancel.is_cancelled() {
            let report = dispatcher.run_cycle(&products, cancel).await;
            cycles += 1;
            on_report(&report);

            info!("Next cycle in {}s", self.interval.as_secs());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Watch stopped after {} cycles", cycles);
        Ok(cycles)
    }
}
