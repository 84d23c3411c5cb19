//! Retry behaviour of the HTTP fetcher against a local server with real
//! timers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap as AxumHeaders, StatusCode};
use axum::routing::get;
use axum::Router;
use medallion::fetch::{RetryingFetcher, TokioClock};
use medallion_core::retry::RetryPolicy;
use medallion_core::store::memory::InMemoryBlobStore;
use medallion_core::store::BlobStore;
use medallion_core::PipelineError;
use reqwest::header::{HeaderMap, HeaderValue};

// ─── Test Server ────────────────────────────────────────────────────

/// Routes:
/// - `/down` always 503
/// - `/created` always 201
/// - `/recover` 500 on the first call, then 200
/// - `/page` 200 with a body echoing the `x-token` header
async fn serve() -> (String, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route(
            "/down",
            get(|State(calls): State<Arc<AtomicU32>>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::SERVICE_UNAVAILABLE, "busy")
            }),
        )
        .route(
            "/created",
            get(|State(calls): State<Arc<AtomicU32>>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::CREATED, "made")
            }),
        )
        .route(
            "/recover",
            get(|State(calls): State<Arc<AtomicU32>>| async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::INTERNAL_SERVER_ERROR, "oops".to_string())
                } else {
                    (StatusCode::OK, "recovered".to_string())
                }
            }),
        )
        .route(
            "/page",
            get(
                |State(calls): State<Arc<AtomicU32>>, headers: AxumHeaders| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let token = headers
                        .get("x-token")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("none")
                        .to_string();
                    (StatusCode::OK, format!("Hello {}", token))
                },
            ),
        )
        .with_state(Arc::clone(&calls));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), calls)
}

fn fetcher(max_attempts: u32, schedule_ms: &[u64]) -> RetryingFetcher {
    let schedule = schedule_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
    RetryingFetcher::new(
        reqwest::Client::new(),
        RetryPolicy::new(max_attempts, schedule).with_backoff_after_last(true),
        TokioClock,
    )
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_persistent_503_exhausts_attempts() {
    let (base, calls) = serve().await;
    let url = format!("{}/down", base);

    let started = Instant::now();
    let err = fetcher(2, &[20, 40])
        .fetch(&url, &HeaderMap::new())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(elapsed >= Duration::from_millis(60), "elapsed {:?}", elapsed);
    match err {
        PipelineError::Fetch {
            url: failed,
            attempts,
            message,
        } => {
            assert_eq!(failed, url);
            assert_eq!(attempts, 2);
            assert!(message.contains("503"), "message: {}", message);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_per_call_retries_cap_attempts() {
    let (base, calls) = serve().await;
    let url = format!("{}/down", base);

    let err = fetcher(5, &[5])
        .fetch_with_retries(&url, &HeaderMap::new(), 2)
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(matches!(err, PipelineError::Fetch { attempts: 2, .. }));
}

#[tokio::test]
async fn test_non_200_success_codes_are_failures() {
    let (base, calls) = serve().await;
    let err = fetcher(3, &[5])
        .fetch(&format!("{}/created", base), &HeaderMap::new())
        .await
        .unwrap_err();

    assert!(err.is_file_scoped());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_recovers_after_a_failure() {
    let (base, calls) = serve().await;
    let payload = fetcher(3, &[10])
        .fetch(&format!("{}/recover", base), &HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(payload.status, 200);
    assert_eq!(payload.text().unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_sends_caller_headers() {
    let (base, calls) = serve().await;
    let mut headers = HeaderMap::new();
    headers.insert("x-token", HeaderValue::from_static("abc"));

    let payload = fetcher(1, &[]).fetch(&format!("{}/page", base), &headers).await.unwrap();

    assert_eq!(payload.text().unwrap(), "Hello abc");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ─── Scrape ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scrape_skips_failed_pages() {
    use medallion::scrape::{scrape_to_raw, BodyExtractor, ScrapeOptions};

    let (base, _) = serve().await;
    let store = InMemoryBlobStore::new();
    let urls = vec![
        format!("{}/page", base),
        format!("{}/down", base),
        format!("{}/page", base),
    ];
    let options = ScrapeOptions {
        object_prefix: "books".to_string(),
        delay: Duration::ZERO,
        headers: HeaderMap::new(),
    };

    let records = scrape_to_raw(&urls, &fetcher(1, &[1]), &BodyExtractor, &store, &options).await;

    assert_eq!(records.len(), 2);
    assert!(records[0].object_name.starts_with("raw/books_"));
    assert!(records[0].object_name.ends_with("_0.txt"));
    assert!(records[1].object_name.ends_with("_2.txt"));

    let written = store.list("raw/", ".txt").await.unwrap();
    assert_eq!(written.len(), 2);
    let text = String::from_utf8(store.get(&written[0]).await.unwrap()).unwrap();
    assert!(text.starts_with("Title: Unknown Title\n"));
    assert!(text.ends_with("\n\nHello none"));
}
