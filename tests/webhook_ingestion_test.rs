use axum::http::StatusCode;
use mintwatch::api;
use mintwatch::config::Config;
use mintwatch::db::init_db;
use mintwatch::domain::{Mint, TimeMs};
use mintwatch::ingest::IngestWorker;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    app: axum::Router,
    repo: Arc<mintwatch::Repository>,
    config: Arc<Config>,
    _temp: TempDir,
}

async fn setup_test_app(extra_env: &[(&str, &str)]) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(mintwatch::Repository::new(pool));

    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), db_path);
    env.insert("WEBHOOK_SECRET".to_string(), SECRET.to_string());
    env.insert("TRACKED_TOKENS".to_string(), "MINT_A".to_string());
    for (k, v) in extra_env {
        env.insert(k.to_string(), v.to_string());
    }
    let config = Arc::new(Config::from_env_map(env).unwrap());

    let app = api::create_router(api::AppState::new(repo.clone(), config.clone()));

    TestApp {
        app,
        repo,
        config,
        _temp: temp_dir,
    }
}

fn swap_payload(signature: &str, timestamp_secs: i64) -> String {
    serde_json::json!([{
        "signature": signature,
        "slot": 100,
        "timestamp": timestamp_secs,
        "events": {
            "swap": {
                "tokenOutputs": [{
                    "mint": "MINT_A",
                    "userAccount": "WALLET_1",
                    "rawTokenAmount": {"tokenAmount": "1000"}
                }],
                "priceUsd": "1",
                "liquidityUsd": "60000"
            }
        }
    }])
    .to_string()
}

async fn post_events(app: axum::Router, secret: Option<&str>, body: &str) -> (StatusCode, Vec<u8>) {
    let mut builder = axum::http::Request::builder()
        .method("POST")
        .uri("/webhooks/events")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-webhook-secret", secret);
    }
    let req = builder.body(axum::body::Body::from(body.to_string())).unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_wrong_secret_rejected_before_queue() {
    let test_app = setup_test_app(&[]).await;

    let (status, _) = post_events(
        test_app.app.clone(),
        Some("wrong"),
        &swap_payload("sig1", 1_700_000_000),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_events(test_app.app, None, &swap_payload("sig1", 1_700_000_000)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let pending = test_app
        .repo
        .count_raw_events_by_status("pending")
        .await
        .unwrap();
    assert_eq!(pending, 0, "rejected requests must not touch the queue");
}

#[tokio::test]
async fn test_non_array_body_rejected() {
    let test_app = setup_test_app(&[]).await;

    let (status, _) = post_events(test_app.app.clone(), Some(SECRET), "{\"not\": \"array\"}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_events(test_app.app, Some(SECRET), "not json at all").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_webhook_yields_one_trade_set() {
    let test_app = setup_test_app(&[]).await;
    let payload = swap_payload("sig1", 1_700_000_000);

    let (status, body) = post_events(test_app.app.clone(), Some(SECRET), &payload).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["accepted"], serde_json::Value::Bool(true));

    // Replays are acknowledged but never stored twice.
    for _ in 0..3 {
        let (status, body) = post_events(test_app.app.clone(), Some(SECRET), &payload).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["duplicate"], serde_json::Value::Bool(true));
    }

    let worker = IngestWorker::new(test_app.repo.clone(), test_app.config.clone());
    worker.process_batch(TimeMs::new(1_700_000_100_000)).await.unwrap();

    let count = test_app
        .repo
        .trade_count_until(&Mint::new("MINT_A"), TimeMs::new(i64::MAX))
        .await
        .unwrap();
    assert_eq!(count, 1);

    let (status, stats) = get(test_app.app, "/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["swaps_inserted"], 1);
    assert_eq!(stats["ignored_replay"], 3);
}

#[tokio::test]
async fn test_ingestion_disabled_acknowledges_without_enqueue() {
    let test_app = setup_test_app(&[("INGESTION_ENABLED", "false")]).await;

    let (status, body) = post_events(
        test_app.app.clone(),
        Some(SECRET),
        &swap_payload("sig1", 1_700_000_000),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["accepted"], serde_json::Value::Bool(false));

    let pending = test_app
        .repo
        .count_raw_events_by_status("pending")
        .await
        .unwrap();
    assert_eq!(pending, 0);

    let (_, stats) = get(test_app.app, "/v1/stats").await;
    assert_eq!(stats["ignored_ingestion_disabled"], 1);
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app(&[]).await;

    let (status, body) = get(test_app.app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(test_app.app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}
