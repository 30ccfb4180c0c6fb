//! In-process scenario tests for rsv-daemon HTTP endpoints.
//!
//! The router runs over the in-memory store and is driven with
//! `tower::ServiceExt::oneshot`; no socket or database is needed.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rsv_daemon::{routes, state};
use rsv_testkit::{lincoln_csv, new_booking, MemStore};
use tokio::sync::watch;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    router: axum::Router,
    store: Arc<MemStore>,
    dir: tempfile::TempDir,
}

fn harness() -> Harness {
    harness_with_stop(watch::channel(false).1)
}

fn harness_with_stop(stop: watch::Receiver<bool>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let st = Arc::new(state::AppState::new(
        Arc::clone(&store),
        dir.path().join("uploads"),
        stop,
    ));
    Harness {
        router: routes::build_router(st),
        store,
        dir,
    }
}

async fn call(router: &axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.clone().oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post(uri: &str, body: String) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/csv")
        .body(axum::body::Body::from(body))
        .unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let h = harness();
    let (status, body) = call(&h.router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "rsv-daemon");
}

// ---------------------------------------------------------------------------
// /v1/uploads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn latest_timestamp_is_null_without_uploads() {
    let h = harness();
    let (status, body) = call(&h.router, get("/v1/uploads/latest-timestamp")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse_json(body)["timestamp"].is_null());
}

#[tokio::test]
async fn unknown_token_returns_404_before() {
    let h = harness();
    let (status, body) = call(&h.router, get("/v1/uploads/20240105093000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["status"], "before");
}

#[tokio::test]
async fn submit_without_site_controller_is_400() {
    let h = harness();
    let csv = lincoln_csv(&[new_booking("Tanaka", "0312345678")]).unwrap();
    let (status, body) = call(&h.router, post("/v1/uploads/20240105093000", csv)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"].as_str().unwrap().contains("sc"));
    assert!(h.store.uploads().is_empty());
}

#[tokio::test]
async fn submit_with_unknown_site_controller_is_400() {
    let h = harness();
    let csv = lincoln_csv(&[new_booking("Tanaka", "0312345678")]).unwrap();
    let (status, _) = call(&h.router, post("/v1/uploads/20240105093000?sc=neppan", csv)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.store.uploads().is_empty());
}

#[tokio::test]
async fn submit_with_malformed_token_is_400() {
    let h = harness();
    let (status, _) = call(&h.router, post("/v1/uploads/latest?sc=lincoln", String::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_ingests_and_status_follows_token() {
    let h = harness();
    let csv = lincoln_csv(&[new_booking("Tanaka", "0312345678")]).unwrap();

    let (status, body) = call(
        &h.router,
        post("/v1/uploads/20240105093000?sc=lincoln&name=bookings", csv),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["status"], "complete");
    assert_eq!(json["created"], 1);
    assert_eq!(json["file_name"], "bookings_20240105093000.csv");
    assert!(h
        .dir
        .path()
        .join("uploads")
        .join("bookings_20240105093000.csv")
        .exists());

    let (status, body) = call(&h.router, get("/v1/uploads/20240105093000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "complete");

    let (_, body) = call(&h.router, get("/v1/uploads/latest-timestamp")).await;
    assert_eq!(parse_json(body)["timestamp"], "2024/01/05 09:30:00");
}

#[tokio::test]
async fn submit_while_stopping_is_503_and_records_nothing() {
    let (stop_tx, stop_rx) = watch::channel(false);
    stop_tx.send(true).unwrap();
    let h = harness_with_stop(stop_rx);
    let csv = lincoln_csv(&[new_booking("Tanaka", "0312345678")]).unwrap();

    let (status, body) = call(
        &h.router,
        post("/v1/uploads/20240105093000?sc=lincoln&name=late", csv),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(parse_json(body)["error"].as_str().unwrap().contains("not started"));
    assert!(h.store.uploads().is_empty());
    assert!(h.store.reservations().is_empty());
}

// ---------------------------------------------------------------------------
// /v1/errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_rows_are_listed_then_resolved() {
    let h = harness();
    let ok = new_booking("Ueda", "0311110000");
    let mut bad = new_booking("Noda", "0322220000");
    bad.sales_channel.clear();
    let csv = lincoln_csv(&[ok, bad]).unwrap();

    let (status, body) = call(
        &h.router,
        post("/v1/uploads/20240106120000?sc=lincoln&name=mixed", csv),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "ERROR");

    let (status, body) = call(&h.router, get("/v1/errors")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["line_number"], 2);
    assert_eq!(errors[0]["file_name"], "mixed_20240106120000.csv");
    assert_eq!(errors[0]["customer_name"], "Noda");

    let (status, body) = call(&h.router, post("/v1/errors/resolve", String::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["resolved"], 1);

    let (_, body) = call(&h.router, get("/v1/errors")).await;
    assert!(parse_json(body)["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let h = harness();
    let (status, _) = call(&h.router, get("/v1/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
