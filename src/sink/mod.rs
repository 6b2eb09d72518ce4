//! Validates observations and forwards them to storage.
//!
//! Every valid observation is appended, including repeats of the last known
//! values; the [`Ack`] says whether anything changed. Storage errors are
//! reported, not retried.

pub mod notify;

use crate::models::{PriceObservation, TrackedProduct};
use crate::store::ObservationStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

pub use notify::{LogNotifier, Notifier, PriceAlert, PriceDropEvent};

/// Result of a successful recording.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    /// Checksum equals the previous stored observation's.
    pub unchanged: bool,
    pub alerts: Vec<PriceAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SinkError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("invalid observation: {0}")]
    InvalidObservation(String),
}

pub struct ObservationSink {
    store: Arc<dyn ObservationStore>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ObservationSink {
    pub fn new(store: Arc<dyn ObservationStore>) -> Self {
        Self { store, notifier: None }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Records an observation with no product context.
    pub async fn record(&self, observation: &PriceObservation) -> Result<Ack, SinkError> {
        self.record_inner(observation, None).await
    }

    /// Records an observation for `product`, also checking that it belongs to
    /// the product and carries the marketplace currency, and evaluating the
    /// target price.
    pub async fn record_for(
        &self,
        product: &TrackedProduct,
        observation: &PriceObservation,
    ) -> Result<Ack, SinkError> {
        if observation.product_id != product.id {
            return Err(SinkError::InvalidObservation(format!(
                "observation for '{}' recorded against '{}'",
                observation.product_id, product.id
            )));
        }
        if observation.currency != product.currency() {
            return Err(SinkError::InvalidObservation(format!(
                "currency {} does not match marketplace currency {}",
                observation.currency,
                product.currency()
            )));
        }
        self.record_inner(observation, product.target_price).await
    }

    async fn record_inner(
        &self,
        observation: &PriceObservation,
        target: Option<Decimal>,
    ) -> Result<Ack, SinkError> {
        validate(observation)?;

        let previous = self.store.latest(&observation.product_id).await.map_err(|e| {
            error!("Failed to read history for {}: {}", observation.product_id, e);
            SinkError::StorageUnavailable(e.to_string())
        })?;

        self.store.append_observation(observation).await.map_err(|e| {
            error!("Failed to store observation for {}: {}", observation.product_id, e);
            SinkError::StorageUnavailable(e.to_string())
        })?;

        let unchanged = previous.as_ref().is_some_and(|p| p.checksum == observation.checksum);
        info!(
            "Recorded {} {} {} for {}{}",
            observation.price,
            observation.currency,
            if observation.available { "in stock" } else { "unavailable" },
            observation.product_id,
            if unchanged { " (unchanged)" } else { "" }
        );

        let mut alerts = Vec::new();
        if let Some(prev) = &previous {
            if observation.price < prev.price {
                alerts.push(PriceAlert::Dropped(PriceDropEvent {
                    product_id: observation.product_id.clone(),
                    old_price: prev.price,
                    new_price: observation.price,
                }));
            }
        }
        if let Some(target) = target {
            if observation.price < target {
                alerts.push(PriceAlert::TargetReached {
                    product_id: observation.product_id.clone(),
                    price: observation.price,
                    target,
                });
            }
        }

        if let Some(notifier) = &self.notifier {
            for alert in &alerts {
                if let Err(e) = notifier.notify(alert).await {
                    warn!("Notifier failed for {}: {:#}", alert.product_id(), e);
                }
            }
        }

        Ok(Ack { unchanged, alerts })
    }
}

fn validate(observation: &PriceObservation) -> Result<(), SinkError> {
    if observation.product_id.is_empty() {
        return Err(SinkError::InvalidObservation("empty product id".to_string()));
    }
    if observation.price <= Decimal::ZERO {
        return Err(SinkError::InvalidObservation(format!(
            "price must be positive, got {}",
            observation.price
        )));
    }
    let currency = observation.currency.as_str();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(SinkError::InvalidObservation(format!("bad currency code '{}'", currency)));
    }
    Ok(())
}
