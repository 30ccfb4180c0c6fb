//! Scenario: upload transactions move `before -> complete | ERROR` once and
//! never leave a terminal state through the tracker.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rsv_reconcile::*;
use rsv_schemas::{NewUpload, UploadStatus};
use rsv_testkit::MemStore;

fn tracker() -> (Arc<MemStore>, UploadTracker<MemStore>) {
    let store = Arc::new(MemStore::new());
    let t = UploadTracker::new(Arc::clone(&store), tracing::Span::none());
    (store, t)
}

fn upload(name: &str, token: &str) -> NewUpload {
    NewUpload {
        file_name: name.to_string(),
        created_time: None,
        token: token.to_string(),
        path: format!("/uploads/{name}"),
    }
}

#[tokio::test]
async fn scenario_create_starts_before() {
    let (_store, t) = tracker();
    let row = t.create(&upload("a.csv", "")).await.unwrap();
    assert_eq!(row.status, UploadStatus::Before);
    assert_eq!(t.fetch(row.id).await.unwrap().file_name, "a.csv");
}

#[tokio::test]
async fn scenario_finish_twice_is_already_complete() {
    let (store, t) = tracker();
    let row = t.create(&upload("a.csv", "")).await.unwrap();

    t.finish(row.id).await.unwrap();
    let err = t.finish(row.id).await.unwrap_err();

    assert!(matches!(err, LifecycleError::AlreadyComplete(id) if id == row.id));
    assert_eq!(store.upload(row.id).unwrap().status, UploadStatus::Complete);
}

#[tokio::test]
async fn scenario_mark_error_on_complete_is_rejected() {
    let (store, t) = tracker();
    let row = t.create(&upload("a.csv", "")).await.unwrap();
    t.finish(row.id).await.unwrap();

    let err = t.mark_error(row.id).await.unwrap_err();

    assert!(matches!(err, LifecycleError::AlreadyComplete(_)));
    assert_eq!(store.upload(row.id).unwrap().status, UploadStatus::Complete);
}

#[tokio::test]
async fn scenario_finish_after_error_is_already_failed() {
    let (_store, t) = tracker();
    let row = t.create(&upload("a.csv", "")).await.unwrap();
    t.mark_error(row.id).await.unwrap();

    let err = t.finish(row.id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyFailed(_)));
}

#[tokio::test]
async fn scenario_mark_error_is_idempotent() {
    let (store, t) = tracker();
    let row = t.create(&upload("a.csv", "")).await.unwrap();

    t.mark_error(row.id).await.unwrap();
    t.mark_error(row.id).await.unwrap();

    assert_eq!(store.upload(row.id).unwrap().status, UploadStatus::Error);
}

#[tokio::test]
async fn scenario_mark_error_upserts_missing_upload() {
    let (store, t) = tracker();

    t.mark_error(42).await.unwrap();

    let row = store.upload(42).expect("upserted row");
    assert_eq!(row.status, UploadStatus::Error);
    let next = t.create(&upload("b.csv", "")).await.unwrap();
    assert!(next.id > 42, "ids must not collide with the upserted row");
}

#[tokio::test]
async fn scenario_finish_missing_upload_is_not_found() {
    let (_store, t) = tracker();
    let err = t.finish(7).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(7)));
}

#[tokio::test]
async fn scenario_latest_queries_ignore_empty_values() {
    let (_store, t) = tracker();
    assert_eq!(t.latest_created_time().await.unwrap(), None);
    assert!(t.latest_by_token().await.unwrap().is_none());

    let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
    for (name, ts) in [("x.csv", late), ("y.csv", early)] {
        t.create(&NewUpload {
            created_time: Some(ts),
            ..upload(name, "")
        })
        .await
        .unwrap();
    }
    t.create(&upload("api1.csv", "20240105093000")).await.unwrap();
    t.create(&upload("api2.csv", "20240104120000")).await.unwrap();

    assert_eq!(t.latest_created_time().await.unwrap(), Some(late));
    let latest = t.latest_by_token().await.unwrap().unwrap();
    assert_eq!(latest.token, "20240105093000");
    assert_eq!(t.by_token("20240104120000").await.unwrap().len(), 1);
    assert!(t.by_token("19990101000000").await.unwrap().is_empty());
}
