//! Storage collaborator for price observations.
//!
//! The engine only needs two things from storage: append a row and read a
//! product's history back in time order. Schema and migrations belong to
//! whatever sits behind this trait.

pub mod jsonl;
pub mod memory;

use crate::models::{PriceObservation, ProductId};
use async_trait::async_trait;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize observation: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only observation history.
///
/// Implementations must accept concurrent `append_observation` calls.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    async fn append_observation(&self, observation: &PriceObservation) -> Result<(), StoreError>;

    /// All observations for a product, oldest first by `observed_at`.
    async fn read_history(&self, id: &ProductId) -> Result<Vec<PriceObservation>, StoreError>;

    /// Most recent observation for a product.
    async fn latest(&self, id: &ProductId) -> Result<Option<PriceObservation>, StoreError> {
        Ok(self.read_history(id).await?.pop())
    }
}
