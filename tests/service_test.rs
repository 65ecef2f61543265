//! Integration tests for the feed service against an embedded mock feed server
//!
//! The mock serves catalog documents, answers the HEAD version probe with an
//! `X-Content-Version` header and serves PNG images generated in-test.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camfeed::cache::{Clock, ManualClock};
use camfeed::config::{Config, HumanDuration};
use camfeed::service::{FeedService, SyncOutcome};
use camfeed::transport::FetchError;

#[derive(Default)]
struct Feed {
    version: String,
    catalogs: HashMap<String, (StatusCode, String)>,
    images: HashMap<String, Vec<u8>>,
    probe_delay: Option<Duration>,
    catalog_hits: usize,
    image_hits: usize,
}

type Shared = Arc<Mutex<Feed>>;

struct MockFeed {
    addr: SocketAddr,
    feed: Shared,
}

impl MockFeed {
    async fn start() -> Self {
        let feed: Shared = Arc::new(Mutex::new(Feed {
            version: "v1".to_string(),
            ..Feed::default()
        }));

        let app = Router::new()
            .route("/", get(probe))
            .route("/img/{name}", get(image))
            .route("/{file}", get(catalog))
            .with_state(feed.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self { addr, feed }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/{path}", self.addr)
    }

    fn set_catalog(&self, file: &str, body: serde_json::Value) {
        self.feed
            .lock()
            .unwrap()
            .catalogs
            .insert(file.to_string(), (StatusCode::OK, body.to_string()));
    }

    fn fail_catalog(&self, file: &str, status: StatusCode) {
        self.feed
            .lock()
            .unwrap()
            .catalogs
            .insert(file.to_string(), (status, String::new()));
    }

    fn set_image(&self, name: &str, width: u32, height: u32) {
        self.feed
            .lock()
            .unwrap()
            .images
            .insert(name.to_string(), png(width, height));
    }

    fn set_version(&self, version: &str) {
        self.feed.lock().unwrap().version = version.to_string();
    }

    fn slow_probe(&self, delay: Duration) {
        self.feed.lock().unwrap().probe_delay = Some(delay);
    }

    fn catalog_hits(&self) -> usize {
        self.feed.lock().unwrap().catalog_hits
    }

    fn image_hits(&self) -> usize {
        self.feed.lock().unwrap().image_hits
    }

    /// Config pointing at this mock with a single `gallery` collection
    fn config(&self) -> Config {
        let mut config = Config::default();
        config.catalog.base_url = self.url("");
        config.catalog.collections = BTreeMap::from([("gallery".to_string(), "images.json".to_string())]);
        config.network.timeout = HumanDuration::from_millis(500);
        config
    }
}

async fn probe(State(feed): State<Shared>) -> impl IntoResponse {
    let (delay, version) = {
        let feed = feed.lock().unwrap();
        (feed.probe_delay, feed.version.clone())
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    [("x-content-version", version)]
}

async fn catalog(State(feed): State<Shared>, Path(file): Path<String>) -> impl IntoResponse {
    let mut feed = feed.lock().unwrap();
    feed.catalog_hits += 1;
    match feed.catalogs.get(&file) {
        Some((status, body)) => (*status, body.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn image(State(feed): State<Shared>, Path(name): Path<String>) -> impl IntoResponse {
    let mut feed = feed.lock().unwrap();
    feed.image_hits += 1;
    match feed.images.get(&name) {
        Some(bytes) => (StatusCode::OK, bytes.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(pixels)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn test_two_image_catalog_loads_both() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 4, 4);
    mock.set_image("b.png", 8, 2);
    mock.set_catalog("images.json", json!([mock.url("img/a.png"), mock.url("img/b.png")]));

    let service = FeedService::from_config(&mock.config()).unwrap();
    let outcome = service.sync_catalog().await;
    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            tracked: 2,
            fetched: 2,
            failed: 0
        }
    );

    let snapshot = service.snapshot();
    assert_eq!(snapshot.loaded.len(), 2);
    assert!(snapshot.loading.is_empty());
    assert!(snapshot.last_refreshed.is_some());
    assert_eq!(snapshot.loaded[&mock.url("img/b.png")].image.width, 8);
    assert!(snapshot.catalog.iter().all(|d| d.collection.as_deref() == Some("gallery")));
}

#[tokio::test]
async fn test_cameras_catalog_fetches_only_images() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 2, 2);
    mock.set_catalog(
        "images.json",
        json!({
            "cameras": [
                {"src": mock.url("img/a.png"), "title": "Harbour"},
                {"iframe": "<iframe src=\"https://www.youtube.com/embed/abc123\" allowfullscreen></iframe>"}
            ]
        }),
    );

    let service = FeedService::from_config(&mock.config()).unwrap();
    let outcome = service.sync_catalog().await;
    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            tracked: 2,
            fetched: 1,
            failed: 0
        }
    );
    assert_eq!(mock.image_hits(), 1);

    let snapshot = service.snapshot();
    let video = snapshot
        .catalog
        .iter()
        .find(|descriptor| !descriptor.is_image())
        .unwrap();
    assert_eq!(video.url, "https://www.youtube.com/embed/abc123");
    assert_eq!(snapshot.catalog[0].caption.as_deref(), Some("Harbour"));
    assert!(!snapshot.is_failed(&video.url));
}

#[tokio::test]
async fn test_version_equality_suppresses_catalog_fetch() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 1, 1);
    mock.set_catalog("images.json", json!([mock.url("img/a.png")]));

    let service = FeedService::from_config(&mock.config()).unwrap();
    assert!(matches!(service.sync_catalog().await, SyncOutcome::Synced { .. }));
    assert_eq!(service.sync_catalog().await, SyncOutcome::Unchanged);
    assert_eq!(mock.catalog_hits(), 1);

    mock.set_version("v2");
    assert!(matches!(service.sync_catalog().await, SyncOutcome::Synced { .. }));
    assert_eq!(mock.catalog_hits(), 2);
    assert_eq!(service.metrics().probes_unchanged, 1);
}

#[tokio::test]
async fn test_catalog_failure_retried_next_cycle() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 1, 1);
    mock.fail_catalog("images.json", StatusCode::INTERNAL_SERVER_ERROR);

    let service = FeedService::from_config(&mock.config()).unwrap();
    assert_eq!(
        service.sync_catalog().await,
        SyncOutcome::CatalogFailed(FetchError::Http { status: 500 })
    );
    assert_eq!(
        service.snapshot().last_error,
        Some(FetchError::Http { status: 500 })
    );

    // Same version token, but it was never committed
    mock.set_catalog("images.json", json!([mock.url("img/a.png")]));
    assert!(matches!(service.sync_catalog().await, SyncOutcome::Synced { .. }));
    assert!(service.snapshot().last_error.is_none());
}

#[tokio::test]
async fn test_unrecognized_catalog_is_invalid_format() {
    let mock = MockFeed::start().await;
    mock.set_catalog("images.json", json!({"unexpected": true}));

    let service = FeedService::from_config(&mock.config()).unwrap();
    let outcome = service.sync_catalog().await;
    assert!(matches!(outcome, SyncOutcome::CatalogFailed(FetchError::InvalidFormat(_))));
    assert!(service.snapshot().catalog.is_empty());
}

#[tokio::test]
async fn test_probe_timeout_does_not_block_full_refresh() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 1, 1);
    mock.set_catalog("images.json", json!([mock.url("img/a.png")]));

    let mut config = mock.config();
    config.network.timeout = HumanDuration::from_millis(200);
    config.schedule.version_probe_interval = HumanDuration::from_millis(100);
    config.schedule.full_refresh_interval = HumanDuration::from_millis(100);

    let service = FeedService::from_config(&config).unwrap();
    assert!(matches!(service.sync_catalog().await, SyncOutcome::Synced { .. }));
    let hits_before = mock.image_hits();

    mock.slow_probe(Duration::from_secs(2));
    assert!(matches!(
        service.sync_catalog().await,
        SyncOutcome::ProbeFailed(FetchError::Transport(_))
    ));
    assert!(service.snapshot().last_error.is_some());

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    service.stop().await;

    assert!(mock.image_hits() > hits_before);
    assert!(service.metrics().full_refreshes >= 2);
    assert!(service.snapshot().is_loaded(&mock.url("img/a.png")));
}

#[tokio::test]
async fn test_failed_image_can_be_requested_again() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 1, 1);
    mock.set_catalog("images.json", json!([mock.url("img/a.png"), mock.url("img/late.png")]));

    let service = FeedService::from_config(&mock.config()).unwrap();
    assert_eq!(
        service.sync_catalog().await,
        SyncOutcome::Synced {
            tracked: 2,
            fetched: 1,
            failed: 1
        }
    );

    let late = mock.url("img/late.png");
    assert!(service.snapshot().is_failed(&late));
    // Per-identity failures do not touch the catalog-level error
    assert!(service.snapshot().last_error.is_none());

    mock.set_image("late.png", 3, 3);
    let batch = service.request_image(&late).await.unwrap();
    assert!(service.snapshot().is_loading(&late));
    batch.wait().await;

    assert!(service.snapshot().is_loaded(&late));
}

#[tokio::test]
async fn test_dropped_identity_fades_and_is_evicted() {
    let mock = MockFeed::start().await;
    mock.set_image("a.png", 1, 1);
    mock.set_image("b.png", 1, 1);
    mock.set_catalog("images.json", json!([mock.url("img/a.png"), mock.url("img/b.png")]));

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = FeedService::with_clock(&mock.config(), clock.clone()).unwrap();
    service.sync_catalog().await;

    mock.set_catalog("images.json", json!([mock.url("img/b.png")]));
    mock.set_version("v2");
    service.sync_catalog().await;

    let a = mock.url("img/a.png");
    let snapshot = service.snapshot();
    assert_eq!(snapshot.fading_out.get(&a), Some(&clock.now()));
    assert!(!snapshot.is_loading(&a));

    clock.advance(Duration::from_secs(3));
    assert_eq!(service.cache().sweep().await, 1);

    let snapshot = service.snapshot();
    assert!(!snapshot.is_loaded(&a));
    assert!(!snapshot.is_loading(&a));
    assert!(!snapshot.fading_out.contains_key(&a));
    assert_eq!(service.metrics().evictions, 1);
}

#[tokio::test]
async fn test_connectivity_check_reaches_feed_host() {
    let mock = MockFeed::start().await;
    let service = FeedService::from_config(&mock.config()).unwrap();
    let mut rx = service.subscribe_connectivity();
    assert!(!service.connectivity().reachable);

    let status = service.check_connectivity().await;
    assert!(status.reachable);
    assert!(status.checked_at.is_some());
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().reachable);
    assert_eq!(service.connectivity(), status);
}
