//! Per-product results of a cycle.

use crate::extract::ExtractionError;
use crate::fetch::FetchError;
use crate::models::{PriceObservation, ProductId};
use crate::retry::FailureClass;
use crate::sink::{Ack, SinkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an attempt or a product failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractionError),

    /// The catalog entry itself is unusable (bad URL, empty id).
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    /// The id already appeared earlier in the same cycle input.
    #[error("duplicate product id '{0}' in cycle")]
    DuplicateProduct(ProductId),
}

impl FailureReason {
    pub fn class(&self) -> FailureClass {
        match self {
            FailureReason::Fetch(e) => e.into(),
            FailureReason::Extract(e) => e.into(),
            FailureReason::InvalidProduct(_) | FailureReason::DuplicateProduct(_) => {
                FailureClass::NotFound
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientFailure(FailureReason),
    PermanentFailure(FailureReason),
}

/// One fetch+extract attempt. Lives only as long as the cycle report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub product_id: ProductId,
    /// 1-based.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

/// Final state of one product after a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { observation: PriceObservation },
    PermanentFailure { reason: FailureReason },
    RetriesExhausted { reason: FailureReason },
    /// Cancelled, timed out, or the worker died.
    Aborted,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "ok",
            Outcome::PermanentFailure { .. } => "failed",
            Outcome::RetriesExhausted { .. } => "exhausted",
            Outcome::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleResult {
    pub product_id: ProductId,
    pub outcome: Outcome,
    pub attempts: Vec<FetchAttempt>,
    /// Present when the observation was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<Ack>,
    /// Present when recording the observation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_error: Option<SinkError>,
}

impl CycleResult {
    pub fn new(product_id: ProductId, outcome: Outcome, attempts: Vec<FetchAttempt>) -> Self {
        Self { product_id, outcome, attempts, ack: None, sink_error: None }
    }

    pub fn aborted(product_id: ProductId, attempts: Vec<FetchAttempt>) -> Self {
        Self::new(product_id, Outcome::Aborted, attempts)
    }

    pub fn observation(&self) -> Option<&PriceObservation> {
        match &self.outcome {
            Outcome::Success { observation } => Some(observation),
            _ => None,
        }
    }
}

/// Aggregate counts for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total: usize,
    pub succeeded: usize,
    /// Ended with retries exhausted on a transient failure.
    pub transient_failures: usize,
    pub permanent_failures: usize,
    pub aborted: usize,
    /// Observations the store failed to persist.
    pub storage_failures: usize,
    /// Observations the sink rejected as invalid.
    pub rejected: usize,
    pub unchanged: usize,
    pub alerts: usize,
}

impl CycleSummary {
    pub fn from_results(results: &[CycleResult]) -> Self {
        let mut summary = CycleSummary { total: results.len(), ..Default::default() };
        for result in results {
            match &result.outcome {
                Outcome::Success { .. } => summary.succeeded += 1,
                Outcome::PermanentFailure { .. } => summary.permanent_failures += 1,
                Outcome::RetriesExhausted { .. } => summary.transient_failures += 1,
                Outcome::Aborted => summary.aborted += 1,
            }
            match &result.sink_error {
                Some(SinkError::StorageUnavailable(_)) => summary.storage_failures += 1,
                Some(SinkError::InvalidObservation(_)) => summary.rejected += 1,
                None => {}
            }
            if let Some(ack) = &result.ack {
                if ack.unchanged {
                    summary.unchanged += 1;
                }
                summary.alerts += ack.alerts.len();
            }
        }
        summary
    }
}

/// Everything a cycle produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per distinct input product, in input order.
    pub results: Vec<CycleResult>,
    pub summary: CycleSummary,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>, results: Vec<CycleResult>) -> Self {
        let summary = CycleSummary::from_results(&results);
        Self { started_at, finished_at: Utc::now(), results, summary }
    }

    /// True when storage failed for any product.
    pub fn is_degraded(&self) -> bool {
        self.summary.storage_failures > 0
    }

}
