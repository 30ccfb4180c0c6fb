//! Scenario: upload status transitions are enforced by the conditional
//! writes in PgStore.
//!
//! DB-backed test. Skips if RSV_DATABASE_URL is not set.

use std::sync::Arc;

use rsv_db::PgStore;
use rsv_reconcile::{LifecycleError, UploadTracker};
use rsv_schemas::{NewUpload, UploadStatus};

#[tokio::test]
async fn pg_upload_lifecycle_enforced() -> anyhow::Result<()> {
    let url = match std::env::var(rsv_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: RSV_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = rsv_db::connect(&url).await?;
    rsv_db::migrate(&pool).await?;
    let store = Arc::new(PgStore::new(pool));
    let tracker = UploadTracker::new(Arc::clone(&store), tracing::Span::none());

    // --- before -> complete, then reject a second finish and mark_error ---
    let up = tracker
        .create(&NewUpload {
            file_name: "lifecycle.csv".to_string(),
            created_time: None,
            token: "20240105093000".to_string(),
            path: String::new(),
        })
        .await?;
    assert_eq!(up.status, UploadStatus::Before);

    tracker.finish(up.id).await?;
    assert!(matches!(
        tracker.finish(up.id).await,
        Err(LifecycleError::AlreadyComplete(_))
    ));
    assert!(matches!(
        tracker.mark_error(up.id).await,
        Err(LifecycleError::AlreadyComplete(_))
    ));

    // --- mark_error on a missing id upserts and keeps the sequence ahead ---
    let max_id: i64 = sqlx::query_scalar("select coalesce(max(id), 0) from csv_upload_transactions")
        .fetch_one(store.pool())
        .await?;
    let ghost = max_id + 1000;
    tracker.mark_error(ghost).await?;
    assert_eq!(tracker.fetch(ghost).await?.status, UploadStatus::Error);

    let next = tracker
        .create(&NewUpload {
            file_name: "after-ghost.csv".to_string(),
            created_time: None,
            token: String::new(),
            path: String::new(),
        })
        .await?;
    assert!(next.id > ghost);
    Ok(())
}
