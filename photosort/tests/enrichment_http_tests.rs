//! Enrichment client tests against a local mock description service
//!
//! Each test binds an axum server on an ephemeral port and scripts its
//! status sequence, then asserts the client's retry, backoff, and parsing
//! behavior from the outside.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use photosort::{
    EnrichmentClient, EnrichmentConfig, EnrichmentResult, MatchResolver, Orchestrator, RateGate,
    VerifiedTransfer,
};
use photosort_common::events::NullSink;
use serde_json::{json, Value};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct MockService {
    hits: Arc<AtomicUsize>,
    /// Status codes returned for the first N requests, in order; later
    /// requests get 200 with the scripted body
    failures: Arc<Vec<u16>>,
    body: Value,
}

async fn describe_handler(State(mock): State<MockService>) -> (StatusCode, Json<Value>) {
    let n = mock.hits.fetch_add(1, Ordering::SeqCst);
    match mock.failures.get(n) {
        Some(&status) => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({"message": "scripted failure"})),
        ),
        None => (StatusCode::OK, Json(mock.body.clone())),
    }
}

/// Start the mock service; returns its endpoint URL and hit counter
async fn start_mock(failures: Vec<u16>, body: Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let mock = MockService {
        hits: hits.clone(),
        failures: Arc::new(failures),
        body,
    };
    let app = Router::new()
        .route("/describe", post(describe_handler))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/describe", addr), hits)
}

fn client_for(endpoint: String) -> EnrichmentClient {
    let mut config = EnrichmentConfig::default();
    config.endpoint = endpoint;
    config.api_key = "test-key".to_string();
    // Keep the gate out of the way; these tests measure backoff, not the gate
    config.requests_per_second = 1000.0;
    EnrichmentClient::new(config).unwrap()
}

#[tokio::test]
async fn direct_text_response_is_described_and_sanitized() {
    let (endpoint, hits) =
        start_mock(vec![], json!({"output": {"text": "a red bicycle.jpg"}})).await;

    let result = client_for(endpoint).describe(b"fake image bytes").await;

    assert_eq!(result, EnrichmentResult::Described("a_red_bicycle".to_string()));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn choices_response_shape_is_accepted() {
    let body = json!({
        "output": {
            "choices": [{
                "message": {
                    "content": [{ "text": "old temple gate" }],
                },
            }],
        },
    });
    let (endpoint, _) = start_mock(vec![], body).await;

    let result = client_for(endpoint).describe(b"fake image bytes").await;

    assert_eq!(
        result,
        EnrichmentResult::Described("old_temple_gate".to_string())
    );
}

#[tokio::test]
async fn bad_request_fails_without_retry() {
    let (endpoint, hits) = start_mock(vec![400], json!({})).await;

    let result = client_for(endpoint).describe(b"fake image bytes").await;

    assert_eq!(result, EnrichmentResult::Failed);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn service_errors_retry_with_backoff_then_succeed() {
    let (endpoint, hits) =
        start_mock(vec![503, 503], json!({"output": {"text": "a red bicycle"}})).await;
    let client = client_for(endpoint);

    let start = Instant::now();
    let result = client.describe(b"fake image bytes").await;
    let elapsed = start.elapsed();

    assert_eq!(result, EnrichmentResult::Described("a_red_bicycle".to_string()));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    // Two backoff sleeps: 1.5^0 + 1.5^1 seconds
    assert!(elapsed >= Duration::from_secs_f64(2.4), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn retries_exhausted_is_failed() {
    let (endpoint, hits) = start_mock(vec![503, 503, 503, 503], json!({})).await;

    let result = client_for(endpoint).describe(b"fake image bytes").await;

    assert_eq!(result, EnrichmentResult::Failed);
    // max_retries = 2: exactly three attempts
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn usable_text_missing_is_failed() {
    let (endpoint, hits) = start_mock(vec![], json!({"output": {"choices": []}})).await;

    let result = client_for(endpoint).describe(b"fake image bytes").await;

    assert_eq!(result, EnrichmentResult::Failed);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clients_sharing_a_rate_gate_are_jointly_throttled() {
    let (endpoint, hits) = start_mock(vec![], json!({"output": {"text": "shared"}})).await;

    let gate = Arc::new(RateGate::new(Duration::from_millis(200)));
    let mut config = EnrichmentConfig::default();
    config.endpoint = endpoint;
    config.api_key = "test-key".to_string();
    let first = EnrichmentClient::with_rate_gate(config.clone(), gate.clone()).unwrap();
    let second = EnrichmentClient::with_rate_gate(config, gate).unwrap();

    let start = Instant::now();
    let a = first.describe(b"fake image bytes").await;
    let b = second.describe(b"fake image bytes").await;

    assert!(matches!(a, EnrichmentResult::Described(_)));
    assert!(matches!(b, EnrichmentResult::Described(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    // A per-client gate would admit the second client's first call
    // immediately; the shared gate spaces the two calls out
    assert!(
        start.elapsed() >= Duration::from_millis(200),
        "elapsed {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn enrichment_mode_transfers_under_described_label() {
    let (endpoint, _) = start_mock(vec![], json!({"output": {"text": "a red bicycle"}})).await;

    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    fs::write(src.path().join("DSC_0001.jpg"), b"bicycle photo bytes").unwrap();
    // Non-image files never reach the service
    fs::write(src.path().join("notes.txt"), b"not an image").unwrap();

    let orchestrator = Orchestrator::new(
        MatchResolver::default(),
        VerifiedTransfer::default(),
        None,
        Some(client_for(endpoint)),
    )
    .unwrap();

    let summary = orchestrator
        .run(src.path(), dst.path(), &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.matched, 1);
    assert_eq!(
        fs::read(dst.path().join("a_red_bicycle.jpg")).unwrap(),
        b"bicycle photo bytes"
    );
}
