//! End-to-end cycles against a local HTTP server.

use pricewatch::dispatch::{AttemptOutcome, FailureReason};
use pricewatch::extract::{ExtractionError, Field};
use pricewatch::fetch::FetchError;
use pricewatch::store::{JsonlStore, MemoryStore, ObservationStore};
use pricewatch::{
    CycleSettings, Dispatcher, ExtractorRegistry, FetchSettings, HttpFetcher, ObservationSink,
    Outcome, Platform, ProductId, RetryPolicy, TrackedProduct,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRICED_PAGE: &str = r#"<html><body>
    <span id="productTitle">Desk Lamp</span>
    <div id="corePrice_feature_div"><span class="a-price"><span class="a-offscreen">$19.99</span></span></div>
    <div id="availability"><span>In Stock</span></div>
</body></html>"#;

const MOVED_PAGE: &str = "<html><body><h1>Page moved</h1></body></html>";

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        jitter: Duration::ZERO,
        server_error_max_attempts: None,
    }
}

fn settings(concurrency: usize, max_attempts: u32) -> CycleSettings {
    CycleSettings {
        concurrency,
        retry: fast_retry(max_attempts),
        cycle_timeout: None,
        grace_period: Duration::from_secs(1),
    }
}

fn fetcher() -> Arc<HttpFetcher> {
    let settings = FetchSettings { timeout: Duration::from_secs(5), ..Default::default() };
    Arc::new(HttpFetcher::new(&settings).unwrap())
}

fn product(server: &MockServer, id: &str) -> TrackedProduct {
    TrackedProduct::new(id, Platform::Amazon, format!("{}/dp/{}", server.uri(), id), id)
}

async fn mount_page(server: &MockServer, id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/dp/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn dispatcher(settings: CycleSettings, store: Arc<dyn ObservationStore>) -> Dispatcher {
    Dispatcher::new(Arc::new(ExtractorRegistry::new()), fetcher(), settings)
        .with_sink(Arc::new(ObservationSink::new(store)))
}

#[tokio::test]
async fn test_priced_page_is_recorded() {
    let server = MockServer::start().await;
    mount_page(&server, "B0LAMP", PRICED_PAGE).await;

    let store = Arc::new(MemoryStore::new());
    let report = dispatcher(settings(4, 3), store.clone())
        .run_cycle(&[product(&server, "B0LAMP")], &CancellationToken::new())
        .await;

    let result = &report.results[0];
    let observation = result.observation().expect("should succeed");
    assert_eq!(observation.price, Decimal::new(1999, 2));
    assert_eq!(observation.currency, "USD");
    assert!(observation.available);
    assert_eq!(result.attempts.len(), 1);

    let history = store.read_history(&ProductId::new("B0LAMP")).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].checksum, observation.checksum);
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dp/B0BUSY"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_page(&server, "B0BUSY", PRICED_PAGE).await;

    let retry = RetryPolicy {
        base_delay: Duration::from_millis(25),
        max_delay: Duration::from_millis(500),
        ..fast_retry(5)
    };
    let started = Instant::now();
    let report = dispatcher(CycleSettings { retry, ..settings(1, 5) }, Arc::new(MemoryStore::new()))
        .run_cycle(&[product(&server, "B0BUSY")], &CancellationToken::new())
        .await;

    let result = &report.results[0];
    assert!(result.outcome.is_success());
    assert_eq!(result.attempts.len(), 4);
    for attempt in &result.attempts[..3] {
        assert_eq!(
            attempt.outcome,
            AttemptOutcome::TransientFailure(FailureReason::Fetch(FetchError::RateLimited {
                status: 429
            }))
        );
    }
    assert_eq!(result.attempts[3].outcome, AttemptOutcome::Success);

    // Waits of 25, 50 and 100 ms separate the four attempts.
    let gaps: Vec<i64> = result
        .attempts
        .windows(2)
        .map(|pair| (pair[1].started_at - pair[0].started_at).num_milliseconds())
        .collect();
    for (gap, wait) in gaps.iter().zip([25, 50, 100]) {
        assert!(*gap >= wait, "gap {}ms shorter than backoff {}ms", gap, wait);
    }
    assert!(gaps.windows(2).all(|w| w[1] > w[0]), "backoff did not grow: {:?}", gaps);
    assert!(started.elapsed() >= Duration::from_millis(175));
}

#[tokio::test]
async fn test_rate_limited_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dp/B0SLOW"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let report = dispatcher(settings(1, 3), Arc::new(MemoryStore::new()))
        .run_cycle(&[product(&server, "B0SLOW")], &CancellationToken::new())
        .await;

    let result = &report.results[0];
    assert_eq!(result.attempts.len(), 3);
    assert_eq!(
        result.outcome,
        Outcome::RetriesExhausted {
            reason: FailureReason::Fetch(FetchError::RateLimited { status: 503 })
        }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dp/B0GONE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let report = dispatcher(settings(1, 5), store.clone())
        .run_cycle(&[product(&server, "B0GONE")], &CancellationToken::new())
        .await;

    let result = &report.results[0];
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(
        result.outcome,
        Outcome::PermanentFailure {
            reason: FailureReason::Fetch(FetchError::NotFound { status: 404 })
        }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_page_without_price_is_permanent() {
    let server = MockServer::start().await;
    mount_page(&server, "B0MOVED", MOVED_PAGE).await;

    let report = dispatcher(settings(1, 5), Arc::new(MemoryStore::new()))
        .run_cycle(&[product(&server, "B0MOVED")], &CancellationToken::new())
        .await;

    let result = &report.results[0];
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(
        result.outcome,
        Outcome::PermanentFailure {
            reason: FailureReason::Extract(ExtractionError::MissingField(Field::Price))
        }
    );
}

#[tokio::test]
async fn test_mixed_batch_keeps_input_order() {
    let server = MockServer::start().await;
    let ids = ["B0A", "B0B", "B0C", "B0D", "B0E", "B0F"];
    for (i, id) in ids.iter().enumerate() {
        if i % 3 == 2 {
            Mock::given(method("GET"))
                .and(path(format!("/dp/{}", id)))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;
        } else {
            mount_page(&server, id, PRICED_PAGE).await;
        }
    }

    let products: Vec<_> = ids.iter().map(|id| product(&server, id)).collect();
    let report = dispatcher(settings(3, 2), Arc::new(MemoryStore::new()))
        .run_cycle(&products, &CancellationToken::new())
        .await;

    assert_eq!(report.results.len(), ids.len());
    for (result, id) in report.results.iter().zip(ids) {
        assert_eq!(result.product_id.as_str(), id);
    }
    assert_eq!(report.summary.succeeded, 4);
    assert_eq!(report.summary.permanent_failures, 2);
    assert!(!report.is_degraded());
}

#[tokio::test]
async fn test_repeat_cycles_append_to_jsonl() {
    let server = MockServer::start().await;
    mount_page(&server, "B0LAMP", PRICED_PAGE).await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlStore::new(dir.path().join("history.jsonl")));
    let dispatcher = dispatcher(settings(2, 2), store.clone());
    let products = [product(&server, "B0LAMP")];

    let first = dispatcher.run_cycle(&products, &CancellationToken::new()).await;
    let second = dispatcher.run_cycle(&products, &CancellationToken::new()).await;

    assert!(!first.results[0].ack.as_ref().unwrap().unchanged);
    assert!(second.results[0].ack.as_ref().unwrap().unchanged);
    assert_eq!(second.summary.unchanged, 1);

    // Reopen from disk.
    let reopened = JsonlStore::new(dir.path().join("history.jsonl"));
    let history = reopened.read_history(&ProductId::new("B0LAMP")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].observed_at <= history[1].observed_at);
}
