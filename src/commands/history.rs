//! Stored price history for one product.

use crate::config::Config;
use crate::format::Formatter;
use crate::models::ProductId;
use crate::store::{JsonlStore, ObservationStore};
use anyhow::{Context, Result};

pub struct HistoryCommand {
    config: Config,
}

impl HistoryCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Formats the newest `limit` observations, newest first.
    pub async fn execute(&self, id: &str, limit: usize) -> Result<String> {
        let store = JsonlStore::new(&self.config.store_path);
        self.execute_with_store(&store, id, limit).await
    }

    /// Reads history from a provided store (for testing).
    pub async fn execute_with_store(
        &self,
        store: &dyn ObservationStore,
        id: &str,
        limit: usize,
    ) -> Result<String> {
        let id = ProductId::new(id.trim());
        let mut rows = store
            .read_history(&id)
            .await
            .with_context(|| format!("Failed to read history for {}", id))?;

        rows.reverse();
        rows.truncate(limit);

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_history(&rows))
    }
}
