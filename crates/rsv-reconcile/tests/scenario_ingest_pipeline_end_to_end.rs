//! Scenario: files go from disk through the parser into a tracked upload
//! and a reconciled batch.

use std::sync::Arc;

use rsv_csv::{CsvError, SiteController};
use rsv_reconcile::*;
use rsv_schemas::{DiscoveredFile, UploadStatus};
use rsv_testkit::{cancel_of, new_booking, write_lincoln_csv, MemStore};
use tokio::sync::watch;

fn pipeline(store: &Arc<MemStore>) -> IngestPipeline<MemStore> {
    IngestPipeline::new(
        Arc::clone(store),
        watch::channel(false).1,
        tracing::Span::none(),
    )
}

#[tokio::test]
async fn scenario_submitted_upload_completes_with_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let r = new_booking("Tanaka", "0312345678");
    let path = write_lincoln_csv(dir.path(), "bookings_20240105093000.csv", &[r]).unwrap();

    let out = pipeline(&store)
        .submit_upload(&path, "20240105093000", "lincoln")
        .await
        .unwrap()
        .expect("started");

    assert_eq!(out.status, UploadStatus::Complete);
    assert_eq!(out.created, 1);
    assert_eq!(out.token, "20240105093000");
    let up = store.upload(out.upload_id).unwrap();
    assert_eq!(up.created_time, None);
    assert_eq!(up.file_name, "bookings_20240105093000.csv");
}

#[tokio::test]
async fn scenario_unknown_site_controller_is_rejected_before_recording() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let path = write_lincoln_csv(dir.path(), "x.csv", &[]).unwrap();

    let err = pipeline(&store)
        .submit_upload(&path, "20240105093000", "neppan")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CsvError>(),
        Some(CsvError::UnsupportedSiteController(_))
    ));
    assert!(store.uploads().is_empty());
}

#[tokio::test]
async fn scenario_unparseable_file_marks_upload_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let path = dir.path().join("broken.csv");
    std::fs::write(&path, "notice,holder\n予約,Tanaka\n").unwrap();

    let out = pipeline(&store)
        .submit_upload(&path, "20240105093000", "lincoln")
        .await
        .unwrap()
        .expect("started");

    assert_eq!(out.status, UploadStatus::Error);
    assert!(out.parse_error.as_deref().unwrap().contains("holder_kana"));
    assert_eq!(store.upload(out.upload_id).unwrap().status, UploadStatus::Error);
    assert!(store.reservations().is_empty());
}

#[tokio::test]
async fn scenario_discovered_file_records_mtime_for_watermark_seed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let r = new_booking("Kimura", "0398765432");
    write_lincoln_csv(dir.path(), "a.csv", &[r.clone(), cancel_of(&r)]).unwrap();

    let found = list_new_files(dir.path(), &FileWatermark::new()).unwrap();
    let file: &DiscoveredFile = &found[0];
    let p = pipeline(&store);
    let out = p
        .ingest_discovered(file, SiteController::Lincoln)
        .await
        .unwrap()
        .expect("started");

    assert_eq!(out.status, UploadStatus::Complete);
    assert_eq!((out.created, out.cancelled), (1, 1));
    assert_eq!(
        p.batch().tracker().latest_created_time().await.unwrap(),
        Some(file.modified_utc)
    );
}

#[tokio::test]
async fn scenario_stopped_pipeline_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let rows = [new_booking("Sato", "0311112222"), new_booking("Ito", "0333334444")];
    write_lincoln_csv(dir.path(), "late.csv", &rows).unwrap();
    let found = list_new_files(dir.path(), &FileWatermark::new()).unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let p = IngestPipeline::new(Arc::clone(&store), stop_rx, tracing::Span::none());
    stop_tx.send(true).unwrap();
    assert!(p.is_stopped());

    let discovered = p
        .ingest_discovered(&found[0], SiteController::Lincoln)
        .await
        .unwrap();
    let submitted = p
        .submit_upload(&found[0].path, "20240105093000", "lincoln")
        .await
        .unwrap();

    assert!(discovered.is_none());
    assert!(submitted.is_none());
    assert!(store.uploads().is_empty(), "no upload may be recorded");
    assert!(store.errors().is_empty(), "no ledger rows for rows never applied");
    assert!(store.reservations().is_empty());
    assert_eq!(
        p.batch().tracker().latest_created_time().await.unwrap(),
        None,
        "the watermark seed must not move past an unprocessed file"
    );
}

#[tokio::test]
async fn scenario_stop_after_start_lets_the_batch_finish() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let rows = [new_booking("Sato", "0311112222"), new_booking("Ito", "0333334444")];
    let path = write_lincoln_csv(dir.path(), "b.csv", &rows).unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let p = IngestPipeline::new(Arc::clone(&store), stop_rx, tracing::Span::none());
    let upload = p
        .batch()
        .tracker()
        .create(&rsv_schemas::NewUpload {
            file_name: "b.csv".to_string(),
            created_time: None,
            token: String::new(),
            path: path.display().to_string(),
        })
        .await
        .unwrap();
    stop_tx.send(true).unwrap();

    let records = SiteController::Lincoln.parser().parse_path(&path).unwrap();
    let report = p.batch().run(upload.id, &records).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.created, 2);
    assert_eq!(store.upload(upload.id).unwrap().status, UploadStatus::Complete);
    assert!(store.errors().is_empty());
}
