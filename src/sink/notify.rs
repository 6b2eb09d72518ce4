//! Price alerts and the notification collaborator.

use crate::models::ProductId;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// A price fell compared to the previous stored observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDropEvent {
    pub product_id: ProductId,
    pub old_price: Decimal,
    pub new_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum PriceAlert {
    Dropped(PriceDropEvent),
    /// Price is below the product's target price.
    TargetReached { product_id: ProductId, price: Decimal, target: Decimal },
}

impl PriceAlert {
    pub fn product_id(&self) -> &ProductId {
        match self {
            PriceAlert::Dropped(event) => &event.product_id,
            PriceAlert::TargetReached { product_id, .. } => product_id,
        }
    }
}

impl fmt::Display for PriceAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceAlert::Dropped(e) => {
                write!(f, "{}: price dropped from {} to {}", e.product_id, e.old_price, e.new_price)
            }
            PriceAlert::TargetReached { product_id, price, target } => {
                write!(f, "{}: price {} is below target {}", product_id, price, target)
            }
        }
    }
}

/// Delivers alerts somewhere (mail, chat, a log). Delivery failures are
/// logged by the sink and never fail a recording.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &PriceAlert) -> Result<()>;
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<()> {
        info!("ALERT {}", alert);
        Ok(())
    }
}
