//! In-process store for tests and dry runs.

use super::{ObservationStore, StoreError};
use crate::models::{PriceObservation, ProductId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<ProductId, Vec<PriceObservation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored rows across all products.
    pub async fn len(&self) -> usize {
        self.rows.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn append_observation(&self, observation: &PriceObservation) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let history = rows.entry(observation.product_id.clone()).or_default();
        history.push(observation.clone());
        // Writers may race with clock order; keep history sorted.
        let n = history.len();
        if n > 1 && history[n - 2].observed_at > history[n - 1].observed_at {
            history.sort_by_key(|o| o.observed_at);
        }
        Ok(())
    }

    async fn read_history(&self, id: &ProductId) -> Result<Vec<PriceObservation>, StoreError> {
        Ok(self.rows.read().await.get(id).cloned().unwrap_or_default())
    }
}
