//! Scenario: ledger entries are listed with their upload's file name and
//! resolved in bulk.

use std::sync::Arc;

use rsv_reconcile::*;
use rsv_schemas::{ErrorStatus, NewExecutionError, NewUpload};
use rsv_testkit::MemStore;

fn entry(upload_id: i64, line: i32) -> NewExecutionError {
    NewExecutionError {
        upload_id,
        line_number: line,
        customer_name: format!("guest{line}"),
        customer_phone: "0300000000".to_string(),
        message: RowError::NoMatchingReservation.to_string(),
    }
}

async fn upload(store: &Arc<MemStore>, file_name: &str) -> i64 {
    UploadTracker::new(Arc::clone(store), tracing::Span::none())
        .create(&NewUpload {
            file_name: file_name.to_string(),
            created_time: None,
            token: String::new(),
            path: String::new(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn scenario_list_unresolved_joins_file_name_in_line_order() {
    let store = Arc::new(MemStore::new());
    let ledger = ErrorLedger::new(Arc::clone(&store), tracing::Span::none());
    let up_id = upload(&store, "20240101.csv").await;

    ledger.record(&entry(up_id, 3)).await.unwrap();
    ledger.record(&entry(up_id, 1)).await.unwrap();

    let listed = ledger.list_unresolved().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].line_number, 1);
    assert_eq!(listed[1].line_number, 3);
    assert!(listed.iter().all(|e| e.file_name == "20240101.csv"));
    assert!(listed.iter().all(|e| e.status == ErrorStatus::Unresolved));
}

#[tokio::test]
async fn scenario_resolve_all_moves_every_unresolved_entry() {
    let store = Arc::new(MemStore::new());
    let ledger = ErrorLedger::new(Arc::clone(&store), tracing::Span::none());
    let up_id = upload(&store, "20240102.csv").await;
    for line in 1..=3 {
        ledger.record(&entry(up_id, line)).await.unwrap();
    }

    assert_eq!(ledger.resolve_all().await.unwrap(), 3);
    assert!(ledger.list_unresolved().await.unwrap().is_empty());
    assert_eq!(ledger.list(ErrorStatus::Resolved).await.unwrap().len(), 3);

    assert_eq!(ledger.resolve_all().await.unwrap(), 0);
}

#[tokio::test]
async fn scenario_entry_for_unknown_upload_is_rejected() {
    let store = Arc::new(MemStore::new());
    let ledger = ErrorLedger::new(Arc::clone(&store), tracing::Span::none());

    let err = ledger.record(&entry(404, 1)).await.unwrap_err();

    assert!(format!("{err:#}").contains("upload 404 does not exist"));
    assert!(store.errors().is_empty());
}
