//! Core data types: tracked products and price observations.

use crate::extract::Extracted;
use crate::platform::{Platform, Region};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Opaque product identity assigned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A listing whose price is being monitored. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedProduct {
    pub id: ProductId,
    pub platform: Platform,
    pub url: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Alert threshold: prices below this trigger a target alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<Decimal>,
}

impl TrackedProduct {
    /// Creates a product created now, with no target price.
    pub fn new(
        id: impl Into<ProductId>,
        platform: Platform,
        url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform,
            url: url.into(),
            name: name.into(),
            created_at: Utc::now(),
            target_price: None,
        }
    }

    /// Sets the alert threshold.
    pub fn with_target(mut self, target: Decimal) -> Self {
        self.target_price = Some(target);
        self
    }

    /// Marketplace region from the URL host. Unparseable or unknown hosts
    /// resolve to the US marketplace.
    pub fn region(&self) -> Region {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(Region::from_host))
            .unwrap_or_default()
    }

    /// Marketplace currency code, e.g. `EUR` for `amazon.de`.
    pub fn currency(&self) -> &'static str {
        self.region().currency()
    }

    /// Checks that the URL is absolute http(s) with a host.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("product id is empty".to_string());
        }
        let url = Url::parse(&self.url).map_err(|e| format!("invalid URL '{}': {}", self.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported URL scheme '{}'", url.scheme()));
        }
        if url.host_str().is_none() {
            return Err(format!("URL '{}' has no host", self.url));
        }
        Ok(())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One normalized price reading. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub product_id: ProductId,
    pub price: Decimal,
    pub currency: String,
    pub available: bool,
    pub observed_at: DateTime<Utc>,
    pub checksum: String,
}

impl PriceObservation {
    /// Stamps an extraction with its product and the current time.
    pub fn from_extracted(product_id: ProductId, extracted: &Extracted) -> Self {
        Self::at(product_id, extracted, Utc::now())
    }

    /// Like [`from_extracted`](Self::from_extracted) with an explicit timestamp.
    pub fn at(product_id: ProductId, extracted: &Extracted, observed_at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            price: extracted.price,
            currency: extracted.currency.clone(),
            available: extracted.available,
            observed_at,
            checksum: extracted.checksum.clone(),
        }
    }
}
