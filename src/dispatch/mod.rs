//! Fans a batch of tracked products out over bounded concurrent workers.
//!
//! Each worker runs fetch then extract for one product, retrying under the
//! [`RetryPolicy`], and records a successful observation through the sink.
//! A semaphore bounds how many products are in flight. The caller's
//! [`CancellationToken`] is checked while waiting for admission, before every
//! attempt and during every backoff sleep. An attempt that has started is
//! never interrupted by cancellation.

pub mod outcome;

use crate::extract::ExtractorRegistry;
use crate::fetch::Fetcher;
use crate::models::{PriceObservation, TrackedProduct};
use crate::platform::Region;
use crate::retry::{GiveUpReason, RetryDecision, RetryPolicy};
use crate::sink::ObservationSink;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use outcome::{
    AttemptOutcome, CycleReport, CycleResult, CycleSummary, FailureReason, FetchAttempt, Outcome,
};

/// Cycle parameters, fixed when the dispatcher is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    /// Products in flight at once. Zero is treated as one.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Wall-clock budget for the whole cycle.
    pub cycle_timeout: Option<Duration>,
    /// How long stragglers may keep running after the cycle timeout before
    /// they are aborted. Normally the fetch timeout.
    pub grace_period: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            cycle_timeout: None,
            grace_period: Duration::from_secs(30),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ExtractorRegistry>,
    fetcher: Arc<dyn Fetcher>,
    sink: Option<Arc<ObservationSink>>,
    settings: CycleSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ExtractorRegistry>,
        fetcher: Arc<dyn Fetcher>,
        settings: CycleSettings,
    ) -> Self {
        Self { registry, fetcher, sink: None, settings }
    }

    /// Records successful observations through `sink`.
    pub fn with_sink(mut self, sink: Arc<ObservationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Runs one cycle over `products`.
    ///
    /// Returns exactly one result per input entry, in input order.
    /// A repeated id is fetched once; its later entries fail permanently
    /// with [`FailureReason::DuplicateProduct`] and no attempts.
    pub async fn run_cycle(
        &self,
        products: &[TrackedProduct],
        cancel: &CancellationToken,
    ) -> CycleReport {
        let started_at = Utc::now();

        info!(
            "Starting cycle: {} products, concurrency {}",
            products.len(),
            self.settings.concurrency.max(1)
        );

        // Timeouts cancel this child only, never the caller's token.
        let cycle_token = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<CycleResult>> = (0..products.len()).map(|_| None).collect();
        let mut seen = HashSet::new();

        for (index, product) in products.iter().enumerate() {
            if !seen.insert(product.id.clone()) {
                warn!("Duplicate product id '{}' in cycle input; fetching it once", product.id);
                let reason = FailureReason::DuplicateProduct(product.id.clone());
                slots[index] = Some(CycleResult::new(
                    product.id.clone(),
                    Outcome::PermanentFailure { reason },
                    Vec::new(),
                ));
                continue;
            }

            let worker = Worker {
                registry: Arc::clone(&self.registry),
                fetcher: Arc::clone(&self.fetcher),
                sink: self.sink.clone(),
                retry: self.settings.retry,
                semaphore: Arc::clone(&semaphore),
                cancel: cycle_token.clone(),
            };
            let product = product.clone();
            tasks.spawn(async move { (index, worker.run(product).await) });
        }

        match self.settings.cycle_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, drain(&mut tasks, &mut slots)).await.is_err() {
                    warn!("Cycle timed out after {:?}; cancelling remaining products", limit);
                    cycle_token.cancel();

                    let grace = self.settings.grace_period;
                    if tokio::time::timeout(grace, drain(&mut tasks, &mut slots)).await.is_err() {
                        warn!("Aborting {} products still running", tasks.len());
                        tasks.abort_all();
                        drain(&mut tasks, &mut slots).await;
                    }
                }
            }
            None => drain(&mut tasks, &mut slots).await,
        }

        let results: Vec<CycleResult> = slots
            .into_iter()
            .zip(products)
            .map(|(slot, product)| {
                slot.unwrap_or_else(|| CycleResult::aborted(product.id.clone(), Vec::new()))
            })
            .collect();

        let report = CycleReport::new(started_at, results);
        let s = &report.summary;
        info!(
            "Cycle finished: {} ok, {} failed, {} exhausted, {} aborted, {} storage errors",
            s.succeeded, s.permanent_failures, s.transient_failures, s.aborted, s.storage_failures
        );
        report
    }
}

async fn drain(
    tasks: &mut JoinSet<(usize, CycleResult)>,
    slots: &mut [Option<CycleResult>],
) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) if e.is_panic() => error!("Worker panicked: {}", e),
            Err(e) => debug!("Worker aborted: {}", e),
        }
    }
}

struct Worker {
    registry: Arc<ExtractorRegistry>,
    fetcher: Arc<dyn Fetcher>,
    sink: Option<Arc<ObservationSink>>,
    retry: RetryPolicy,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, product: TrackedProduct) -> CycleResult {
        let id = product.id.clone();
        let mut attempts = Vec::new();

        if let Err(msg) = product.validate() {
            warn!("Skipping {}: {}", id, msg);
            let reason = FailureReason::InvalidProduct(msg);
            return CycleResult::new(id, Outcome::PermanentFailure { reason }, attempts);
        }

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return CycleResult::aborted(id, attempts),
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return CycleResult::aborted(id, attempts),
            },
        };

        let region = product.region();
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                debug!("{} cancelled before attempt {}", id, attempt + 1);
                return CycleResult::aborted(id, attempts);
            }

            attempt += 1;
            let started_at = Utc::now();
            let clock = Instant::now();

            let result = self.attempt(&product, region).await;
            let latency_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

            let reason = match result {
                Ok(observation) => {
                    attempts.push(FetchAttempt {
                        product_id: id.clone(),
                        attempt,
                        started_at,
                        outcome: AttemptOutcome::Success,
                        latency_ms,
                    });
                    return self.finish(&product, observation, attempts).await;
                }
                Err(reason) => reason,
            };

            let class = reason.class();
            attempts.push(FetchAttempt {
                product_id: id.clone(),
                attempt,
                started_at,
                outcome: if class.is_transient() {
                    AttemptOutcome::TransientFailure(reason.clone())
                } else {
                    AttemptOutcome::PermanentFailure(reason.clone())
                },
                latency_ms,
            });

            match self.retry.should_retry(attempt, class) {
                RetryDecision::Wait(delay) => {
                    warn!(
                        "{}: attempt {} failed ({}); retrying in {}ms",
                        id,
                        attempt,
                        reason,
                        delay.as_millis()
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return CycleResult::aborted(id, attempts),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp(GiveUpReason::NonRetryable) => {
                    warn!("{}: permanent failure: {}", id, reason);
                    return CycleResult::new(id, Outcome::PermanentFailure { reason }, attempts);
                }
                RetryDecision::GiveUp(GiveUpReason::Exhausted) => {
                    warn!("{}: giving up after {} attempts: {}", id, attempt, reason);
                    return CycleResult::new(id, Outcome::RetriesExhausted { reason }, attempts);
                }
            }
        }
    }

    async fn attempt(
        &self,
        product: &TrackedProduct,
        region: Region,
    ) -> Result<PriceObservation, FailureReason> {
        let page = self.fetcher.fetch(&product.url).await?;
        let extracted = self.registry.extract(product.platform, region, &page.body)?;
        Ok(PriceObservation::from_extracted(product.id.clone(), &extracted))
    }

    async fn finish(
        &self,
        product: &TrackedProduct,
        observation: PriceObservation,
        attempts: Vec<FetchAttempt>,
    ) -> CycleResult {
        let mut result = CycleResult::new(
            product.id.clone(),
            Outcome::Success { observation: observation.clone() },
            attempts,
        );

        if let Some(sink) = &self.sink {
            match sink.record_for(product, &observation).await {
                Ok(ack) => result.ack = Some(ack),
                Err(e) => {
                    warn!("{}: observation not recorded: {}", product.id, e);
                    result.sink_error = Some(e);
                }
            }
        }

        result
    }
}
