//! pricewatch - concurrent, multi-platform price fetching
//!
//! Fetches tracked Amazon and eBay listings over bounded concurrent workers,
//! extracts prices with per-platform rules, retries transient failures with
//! jittered exponential backoff and records normalized observations.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod fetch;
pub mod format;
pub mod models;
pub mod platform;
pub mod retry;
pub mod sink;
pub mod store;

pub use config::Config;
pub use dispatch::{CycleReport, CycleResult, CycleSettings, Dispatcher, Outcome};
pub use extract::{ExtractionError, ExtractorRegistry, Extracted};
pub use fetch::{FetchError, FetchSettings, Fetcher, HttpFetcher};
pub use models::{PriceObservation, ProductId, TrackedProduct};
pub use platform::{Platform, Region};
pub use retry::{FailureClass, RetryDecision, RetryPolicy};
pub use sink::{Ack, ObservationSink, SinkError};
pub use store::{JsonlStore, MemoryStore, ObservationStore, StoreError};
