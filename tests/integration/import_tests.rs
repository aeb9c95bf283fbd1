//! Integration tests for bulk import
//!
//! These tests run the whole scrape-then-import pipeline against a wiremock
//! Apify API and CDN, with an in-memory content store standing in for
//! WordPress.

use async_trait::async_trait;
use futures::StreamExt;
use instapress::apify::ApifyClient;
use instapress::cache::{ResultCache, TtlPolicy};
use instapress::config::ApifyConfig;
use instapress::import::{BulkImporter, ImportOptions, ImportOutcome, SharedLedger};
use instapress::media::MediaPublisher;
use instapress::progress::{ProgressFrame, ProgressRegistry, ProgressStatus};
use instapress::scraper::CachedScraper;
use instapress::storage::{Ledger, RunOutcome, SqliteLedger};
use instapress::store::{ContentStore, MediaUpload, RecordDraft, StoreError, StoreResult};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTOR: &str = "apify~instagram-scraper";

/// In-memory store recording every call
#[derive(Default)]
struct FakeStore {
    /// 1-based create_record calls that fail
    failing_creates: Vec<usize>,
    /// Metadata keys rejected on every record
    rejected_metadata: Vec<&'static str>,
    reject_primary_media: bool,
    creates: Mutex<Vec<RecordDraft>>,
    uploads: Mutex<Vec<String>>,
    primary: Mutex<Vec<(u64, u64)>>,
    metadata: Mutex<Vec<(u64, String, String)>>,
    /// Cancel this session once this many records exist
    cancel_after: Mutex<Option<(ProgressRegistry, Uuid, usize)>>,
}

impl FakeStore {
    fn failing_on(calls: &[usize]) -> Self {
        Self {
            failing_creates: calls.to_vec(),
            ..Self::default()
        }
    }

    fn created_titles(&self) -> Vec<String> {
        self.creates
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.title.clone())
            .collect()
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn create_record(&self, draft: &RecordDraft) -> StoreResult<u64> {
        let call = {
            let mut creates = self.creates.lock().unwrap();
            creates.push(draft.clone());
            creates.len()
        };
        if self.failing_creates.contains(&call) {
            return Err(StoreError::Rejected {
                status: 500,
                message: "database unavailable".into(),
            });
        }
        if let Some((registry, session, after)) = self.cancel_after.lock().unwrap().as_ref() {
            if call >= *after {
                registry.cancel(*session).unwrap();
            }
        }
        Ok(100 + call as u64)
    }

    async fn upload_media(&self, upload: &MediaUpload) -> StoreResult<u64> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(upload.filename.clone());
        Ok(500 + uploads.len() as u64)
    }

    async fn set_primary_media(&self, record_id: u64, media_id: u64) -> StoreResult<()> {
        if self.reject_primary_media {
            return Err(StoreError::Rejected {
                status: 400,
                message: "invalid featured_media".into(),
            });
        }
        self.primary.lock().unwrap().push((record_id, media_id));
        Ok(())
    }

    async fn set_metadata(&self, record_id: u64, key: &str, value: &str) -> StoreResult<()> {
        if self.rejected_metadata.contains(&key) {
            return Err(StoreError::Rejected {
                status: 403,
                message: format!("meta key {} is not registered", key),
            });
        }
        self.metadata
            .lock()
            .unwrap()
            .push((record_id, key.to_string(), value.to_string()));
        Ok(())
    }
}

fn post(server: &MockServer, short_code: &str) -> Value {
    json!({
        "id": format!("id-{}", short_code),
        "shortCode": short_code,
        "type": "Image",
        "caption": format!("Caption for {}\n#acme", short_code),
        "displayUrl": format!("{}/cdn/{}.jpg", server.uri(), short_code),
        "url": format!("https://www.instagram.com/p/{}/", short_code),
        "ownerUsername": "acme",
        "timestamp": "2024-05-01T09:00:00Z",
        "likesCount": 7,
        "commentsCount": 1
    })
}

/// Mounts a run that succeeds immediately with `items`
async fn mount_apify(server: &MockServer, items: Value) {
    let run = json!({"data": {"id": "run-1", "status": "SUCCEEDED"}});
    Mock::given(method("POST"))
        .and(path(format!("/acts/{}/runs", ACTOR)))
        .respond_with(ResponseTemplate::new(201).set_body_json(run.clone()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1/dataset/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, short_code: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/cdn/{}.jpg", short_code)))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .mount(server)
        .await;
}

fn importer(server: &MockServer, dir: &TempDir, store: Arc<FakeStore>) -> BulkImporter {
    let config = ApifyConfig {
        api_token: "test-token".to_string(),
        base_url: server.uri(),
        actor_id: ACTOR.to_string(),
        poll_interval_secs: 1,
        poll_budget_secs: 10,
        request_timeout_secs: 5,
    };
    let client = ApifyClient::new(&config).unwrap();
    let cache = ResultCache::open(dir.path(), TtlPolicy::default()).unwrap();
    let scraper = Arc::new(CachedScraper::new(Arc::new(client), Arc::new(cache)));
    let media = MediaPublisher::new(Duration::from_secs(5)).unwrap();
    BulkImporter::new(scraper, store, media, ProgressRegistry::new())
}

#[tokio::test]
async fn test_item_failure_does_not_stop_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let codes = ["P1", "P2", "P3", "P4", "P5"];

    mount_apify(&server, Value::Array(codes.iter().map(|c| post(&server, c)).collect())).await;
    for code in codes {
        mount_image(&server, code, 200).await;
    }

    let store = Arc::new(FakeStore::failing_on(&[3]));
    let importer = importer(&server, &dir, store.clone());
    let report = importer.import(&ImportOptions::new("acme", 5)).await;

    assert!(report.success);
    assert_eq!(report.scraped_count, 5);
    assert_eq!(report.imported_count, 4);
    assert_eq!(report.items[2].outcome, ImportOutcome::Failed);
    assert!(report.items[2]
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("database unavailable"));
    assert_eq!(report.items[3].outcome, ImportOutcome::Imported);
    assert_eq!(report.items[4].outcome, ImportOutcome::Imported);
    assert_eq!(report.message, "Successfully imported 4 of 5 posts from @acme");

    // Items are processed in scrape order
    assert_eq!(
        store.created_titles(),
        codes
            .iter()
            .map(|c| format!("Caption for {}", c))
            .collect::<Vec<_>>()
    );

    // Four records, each with eight metadata fields and a featured image
    assert_eq!(store.metadata.lock().unwrap().len(), 4 * 8);
    assert_eq!(store.primary.lock().unwrap().len(), 4);
    let first = &report.items[0];
    assert_eq!(first.record_id, Some(101));
    assert!(first.primary_media_set);
    assert_eq!(first.metadata.len(), 8);
    assert!(first.metadata.iter().all(|m| m.is_ok()));
}

#[tokio::test]
async fn test_media_failure_still_imports_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_apify(&server, json!([post(&server, "P1"), post(&server, "P2")])).await;
    mount_image(&server, "P1", 200).await;
    mount_image(&server, "P2", 404).await;

    let store = Arc::new(FakeStore::default());
    let importer = importer(&server, &dir, store.clone());
    let report = importer.import(&ImportOptions::new("acme", 2)).await;

    assert_eq!(report.imported_count, 2);
    let broken = &report.items[1];
    assert_eq!(broken.outcome, ImportOutcome::Imported);
    assert!(broken.media_id.is_none());
    assert!(broken.media_failure.is_some());
    assert!(!broken.primary_media_set);

    assert_eq!(store.uploads.lock().unwrap().len(), 1);
    assert_eq!(*store.primary.lock().unwrap(), vec![(101, 501)]);
}

#[tokio::test]
async fn test_metadata_and_primary_media_failures_keep_item_imported() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_apify(&server, json!([post(&server, "P1")])).await;
    mount_image(&server, "P1", 200).await;

    let store = Arc::new(FakeStore {
        rejected_metadata: vec!["instagram_likes", "import_date"],
        reject_primary_media: true,
        ..FakeStore::default()
    });
    let importer = importer(&server, &dir, store.clone());
    let report = importer.import(&ImportOptions::new("acme", 1)).await;

    assert!(report.success);
    assert_eq!(report.imported_count, 1);

    let item = &report.items[0];
    assert_eq!(item.outcome, ImportOutcome::Imported);
    assert_eq!(item.record_id, Some(101));
    assert_eq!(item.media_id, Some(501));
    assert!(!item.primary_media_set);
    assert!(item.failure_reason.is_none());

    assert_eq!(item.metadata.len(), 8);
    assert_eq!(item.metadata_failures(), 2);
    for outcome in &item.metadata {
        let rejected = outcome.key == "instagram_likes" || outcome.key == "import_date";
        assert_eq!(outcome.is_ok(), !rejected, "unexpected outcome for {}", outcome.key);
    }
    assert!(item.metadata[2]
        .error
        .as_deref()
        .unwrap()
        .contains("instagram_likes"));

    // The other six fields still reached the store
    assert_eq!(store.metadata.lock().unwrap().len(), 6);
    assert!(store.primary.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_username_is_rejected_before_scraping() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path(format!("/acts/{}/runs", ACTOR)))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(FakeStore::default());
    let importer = importer(&server, &dir, store.clone());
    let session = importer.start_session(" @ ");
    let report = importer.run(session, &ImportOptions::new(" @ ", 5)).await;

    assert!(!report.success);
    assert_eq!(report.scraped_count, 0);
    assert!(report.message.starts_with("Invalid username"));
    assert!(store.creates.lock().unwrap().is_empty());

    let snapshot = importer.progress().read(session).unwrap();
    assert_eq!(snapshot.status, ProgressStatus::Error);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let codes = ["P1", "P2", "P3"];

    mount_apify(&server, Value::Array(codes.iter().map(|c| post(&server, c)).collect())).await;
    for code in codes {
        mount_image(&server, code, 200).await;
    }

    let store = Arc::new(FakeStore::default());
    let importer = importer(&server, &dir, store);
    let session = importer.start_session("acme");
    let frames = importer.progress().subscribe(session).unwrap();
    let collector = tokio::spawn(frames.collect::<Vec<ProgressFrame>>());

    let report = importer.run(session, &ImportOptions::new("acme", 3)).await;
    assert_eq!(report.imported_count, 3);

    let frames = tokio::time::timeout(Duration::from_secs(5), collector)
        .await
        .expect("stream did not end")
        .unwrap();

    assert!(matches!(frames.first(), Some(ProgressFrame::Connected { .. })));
    let last = frames.last().unwrap();
    assert!(matches!(last, ProgressFrame::Complete(_)));
    let last = last.snapshot().unwrap();
    assert_eq!(last.percentage, 100.0);
    assert_eq!(last.status, ProgressStatus::Complete);

    let percentages: Vec<f64> = frames
        .iter()
        .filter_map(|f| f.snapshot())
        .map(|s| s.percentage)
        .collect();
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]));

    // The stream retires the session after its final frame
    assert!(importer.progress().read(session).is_none());
}

#[tokio::test]
async fn test_no_posts_is_a_successful_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_apify(&server, json!([])).await;

    let store = Arc::new(FakeStore::default());
    let importer = importer(&server, &dir, store.clone());
    let session = importer.start_session("ghost");
    let report = importer.run(session, &ImportOptions::new("ghost", 5)).await;

    assert!(report.success);
    assert_eq!(report.scraped_count, 0);
    assert_eq!(report.imported_count, 0);
    assert!(report.message.starts_with("No posts found"));
    assert!(store.creates.lock().unwrap().is_empty());

    let snapshot = importer.progress().read(session).unwrap();
    assert_eq!(snapshot.status, ProgressStatus::Complete);
}

#[tokio::test]
async fn test_failed_scrape_fails_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path(format!("/acts/{}/runs", ACTOR)))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let store = Arc::new(FakeStore::default());
    let importer = importer(&server, &dir, store);
    let session = importer.start_session("acme");
    let report = importer.run(session, &ImportOptions::new("acme", 5)).await;

    assert!(!report.success);
    assert_eq!(report.scraped_count, 0);
    assert!(report.items.is_empty());

    let snapshot = importer.progress().read(session).unwrap();
    assert_eq!(snapshot.status, ProgressStatus::Error);
    assert!(snapshot.message.contains("403"));
}

#[tokio::test]
async fn test_cancel_stops_at_item_boundary() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let codes = ["P1", "P2", "P3", "P4"];

    mount_apify(&server, Value::Array(codes.iter().map(|c| post(&server, c)).collect())).await;
    for code in codes {
        mount_image(&server, code, 200).await;
    }

    let store = Arc::new(FakeStore::default());
    let importer = importer(&server, &dir, store.clone());
    let session = importer.start_session("acme");
    *store.cancel_after.lock().unwrap() = Some((importer.progress().clone(), session, 2));

    let report = importer.run(session, &ImportOptions::new("acme", 4)).await;

    assert!(report.cancelled);
    assert_eq!(report.imported_count, 2);
    assert_eq!(report.items[1].outcome, ImportOutcome::Imported);
    assert_eq!(report.items[2].outcome, ImportOutcome::Pending);
    assert_eq!(store.creates.lock().unwrap().len(), 2);

    let snapshot = importer.progress().read(session).unwrap();
    assert_eq!(snapshot.status, ProgressStatus::Cancelled);
}

#[tokio::test]
async fn test_ledger_skips_previously_imported_posts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_apify(&server, json!([post(&server, "P1"), post(&server, "P2")])).await;
    mount_image(&server, "P1", 200).await;
    mount_image(&server, "P2", 200).await;

    let ledger = Arc::new(Mutex::new(SqliteLedger::open_in_memory().unwrap()));
    let shared: SharedLedger = ledger.clone();

    let first_store = Arc::new(FakeStore::default());
    let first = importer(&server, &dir, first_store.clone()).with_ledger(shared.clone(), "hash-1");
    let report = first.import(&ImportOptions::new("acme", 2)).await;
    assert_eq!(report.imported_count, 2);

    // Second run is served from cache and skips both posts
    let second_store = Arc::new(FakeStore::default());
    let second = importer(&server, &dir, second_store.clone()).with_ledger(shared, "hash-1");
    let report = second.import(&ImportOptions::new("acme", 2)).await;

    assert!(report.success);
    assert_eq!(report.imported_count, 0);
    assert_eq!(report.skipped_count(), 2);
    assert!(second_store.creates.lock().unwrap().is_empty());

    let ledger = ledger.lock().unwrap();
    let imported = ledger.list_imported(Some("acme")).unwrap();
    assert_eq!(imported.len(), 2);
    assert!(imported.iter().all(|p| p.import_method == "apify_bulk_import"));

    let runs = ledger.list_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.outcome == RunOutcome::Completed));
    assert!(runs.iter().any(|r| r.imported_count == 2));
}
