//! Integration tests for scraping through the Apify client and cache
//!
//! These tests use wiremock to stand in for the Apify API and a temporary
//! directory for the result cache.

use instapress::apify::{ApifyClient, ScrapeError};
use instapress::cache::{CacheKind, ResultCache, TtlPolicy};
use instapress::config::ApifyConfig;
use instapress::scraper::{CachedScraper, FetchOptions};
use instapress::ScrapeRequest;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTOR: &str = "apify~instagram-scraper";

fn apify_config(base_url: &str, poll_budget_secs: u64) -> ApifyConfig {
    ApifyConfig {
        api_token: "test-token".to_string(),
        base_url: base_url.to_string(),
        actor_id: ACTOR.to_string(),
        poll_interval_secs: 1,
        poll_budget_secs,
        request_timeout_secs: 5,
    }
}

fn scraper_for(server: &MockServer, dir: &TempDir, poll_budget_secs: u64) -> CachedScraper {
    let client = ApifyClient::new(&apify_config(&server.uri(), poll_budget_secs))
        .expect("Failed to build client");
    let cache = ResultCache::open(dir.path(), TtlPolicy::default()).expect("Failed to open cache");
    CachedScraper::new(Arc::new(client), Arc::new(cache))
}

fn run_body(status: &str) -> Value {
    json!({
        "data": {
            "id": "run-1",
            "status": status,
            "defaultDatasetId": "ds-1",
            "startedAt": "2024-05-01T10:00:00Z"
        }
    })
}

fn post(short_code: &str, likes: i64) -> Value {
    json!({
        "id": format!("id-{}", short_code),
        "shortCode": short_code,
        "type": "Image",
        "caption": format!("Post {} #acme", short_code),
        "displayUrl": format!("https://cdn.example.com/{}.jpg", short_code),
        "url": format!("https://www.instagram.com/p/{}/", short_code),
        "ownerUsername": "acme",
        "timestamp": "2024-05-01T09:00:00.000Z",
        "likesCount": likes,
        "commentsCount": 2
    })
}

async fn mount_submit(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/acts/{}/runs", ACTOR)))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("READY")))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body(status)))
        .mount(server)
        .await;
}

async fn mount_dataset(server: &MockServer, items: Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1/dataset/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_timeline_scrape_normalizes_and_drops_malformed_items() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/acts/{}/runs", ACTOR)))
        .and(body_partial_json(json!({
            "usernames": ["acme"],
            "resultsLimit": 3
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("RUNNING")))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "SUCCEEDED").await;
    mount_dataset(
        &server,
        json!([
            post("A1", 10),
            {"error": "no_items", "errorDescription": "restricted"},
            post("A2", 20),
            post("A3", 30)
        ]),
        1,
    )
    .await;

    let scraper = scraper_for(&server, &dir, 10);
    let request = ScrapeRequest::user_timeline("@Acme", 3, false);
    let records = scraper
        .fetch_posts(&request, FetchOptions::default(), &CancellationToken::new())
        .await
        .expect("Scrape failed");

    assert_eq!(records.len(), 3);
    let codes: Vec<&str> = records.iter().map(|r| r.short_code.as_str()).collect();
    assert_eq!(codes, vec!["A1", "A2", "A3"]);
    assert_eq!(records[1].engagement.likes, 20);
    assert_eq!(records[0].author, "acme");
    assert_eq!(records[0].hashtags, vec!["acme".to_string()]);
}

#[tokio::test]
async fn test_repeated_fetch_is_served_from_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 1).await;
    mount_status(&server, "SUCCEEDED").await;
    mount_dataset(&server, json!([post("A1", 1), post("A2", 2)]), 1).await;

    let scraper = scraper_for(&server, &dir, 10);
    let cancel = CancellationToken::new();

    let first = scraper
        .fetch_posts(
            &ScrapeRequest::user_timeline("acme", 2, false),
            FetchOptions::default(),
            &cancel,
        )
        .await
        .unwrap();

    // Same request spelled differently
    let second = scraper
        .fetch_posts(
            &ScrapeRequest::user_timeline(" @ACME", 2, false),
            FetchOptions::default(),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(scraper.cache().stats().by_kind[CacheKind::UserPosts.as_str()].files, 1);
}

#[tokio::test]
async fn test_refresh_overwrites_cached_entry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 2).await;
    mount_status(&server, "SUCCEEDED").await;
    // First run returns OLD; mocks are matched in mount order
    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1/dataset/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([post("OLD", 1)])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_dataset(&server, json!([post("NEW", 2)]), 1).await;

    let scraper = scraper_for(&server, &dir, 10);
    let cancel = CancellationToken::new();
    let request = ScrapeRequest::user_timeline("acme", 1, false);

    let first = scraper
        .fetch_posts(&request, FetchOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(first[0].short_code, "OLD");

    let refreshed = scraper
        .fetch_posts(&request, FetchOptions::refresh(), &cancel)
        .await
        .unwrap();
    assert_eq!(refreshed[0].short_code, "NEW");

    // Served from the cache, which now holds the refreshed result
    let cached = scraper
        .fetch_posts(&request, FetchOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(cached[0].short_code, "NEW");
    assert_eq!(scraper.cache().stats().total_files, 1);
}

#[tokio::test]
async fn test_empty_result_is_not_cached() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 2).await;
    mount_status(&server, "SUCCEEDED").await;
    mount_dataset(&server, json!([]), 2).await;

    let scraper = scraper_for(&server, &dir, 10);
    let cancel = CancellationToken::new();
    let request = ScrapeRequest::user_timeline("ghost", 5, false);

    for _ in 0..2 {
        let records = scraper
            .fetch_posts(&request, FetchOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(records.is_empty());
    }
    assert_eq!(scraper.cache().stats().total_files, 0);
}

#[tokio::test]
async fn test_poll_timeout_never_fetches_dataset() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 1).await;
    mount_status(&server, "RUNNING").await;
    mount_dataset(&server, json!([post("A1", 1)]), 0).await;

    let scraper = scraper_for(&server, &dir, 2);
    let err = scraper
        .fetch_posts(
            &ScrapeRequest::user_timeline("acme", 1, false),
            FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ScrapeError::PollTimeout { run_id, budget } => {
            assert_eq!(run_id, "run-1");
            assert_eq!(budget, Duration::from_secs(2));
        }
        other => panic!("expected PollTimeout, got {:?}", other),
    }
    assert_eq!(scraper.cache().stats().total_files, 0);
}

#[tokio::test]
async fn test_failed_run_reports_status_message() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "run-1", "status": "FAILED", "statusMessage": "Login required"}
        })))
        .mount(&server)
        .await;
    mount_dataset(&server, json!([]), 0).await;

    let scraper = scraper_for(&server, &dir, 10);
    let err = scraper
        .fetch_posts(
            &ScrapeRequest::user_timeline("acme", 1, false),
            FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ScrapeError::JobFailed { message, .. } => assert_eq!(message, "Login required"),
        other => panic!("expected JobFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_submission() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/acts/{}/runs", ACTOR)))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .expect(1)
        .mount(&server)
        .await;

    let scraper = scraper_for(&server, &dir, 10);
    let err = scraper
        .fetch_posts(
            &ScrapeRequest::user_timeline("acme", 1, false),
            FetchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ScrapeError::SubmissionFailed(message) => assert!(message.contains("401")),
        other => panic!("expected SubmissionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_interrupts_polling() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 1).await;
    mount_status(&server, "RUNNING").await;
    mount_dataset(&server, json!([]), 0).await;

    let scraper = scraper_for(&server, &dir, 30);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = scraper
        .fetch_posts(
            &ScrapeRequest::user_timeline("acme", 1, false),
            FetchOptions::default(),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_profile_lookup_is_cached() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_submit(&server, 1).await;
    mount_status(&server, "SUCCEEDED").await;
    mount_dataset(
        &server,
        json!([{
            "username": "Acme",
            "fullName": "Acme Corp",
            "followersCount": 1200,
            "followsCount": 10,
            "postsCount": 42,
            "verified": true
        }]),
        1,
    )
    .await;

    let scraper = scraper_for(&server, &dir, 10);
    let cancel = CancellationToken::new();

    let profile = scraper
        .fetch_profile("acme", FetchOptions::default(), &cancel)
        .await
        .unwrap()
        .expect("profile missing");
    assert_eq!(profile.full_name.as_deref(), Some("Acme Corp"));
    assert_eq!(profile.followers_count, Some(1200));
    assert!(profile.is_verified);

    let again = scraper
        .fetch_profile("@ACME", FetchOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(again, Some(profile));

    assert_eq!(scraper.cache().invalidate_user("acme"), 1);
}

#[tokio::test]
async fn test_account_usage() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "username": "acme-bot",
                "plan": {"id": "FREE"},
                "monthlyUsage": {"USD": 1.5},
                "limits": {"maxMonthlyUsageUsd": 5}
            }
        })))
        .mount(&server)
        .await;

    let client = ApifyClient::new(&apify_config(&server.uri(), 10)).unwrap();
    let usage = client.account_usage().await.unwrap();
    assert_eq!(usage.username.as_deref(), Some("acme-bot"));
    assert_eq!(usage.plan["id"], "FREE");
}
