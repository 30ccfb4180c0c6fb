//! Scenario: a `new` row and a later `cancel` row reconcile against Postgres.
//!
//! DB-backed test. Skips if RSV_DATABASE_URL is not set.

use std::sync::Arc;

use rsv_db::PgStore;
use rsv_reconcile::{BatchReconciler, RowError};
use rsv_schemas::{NewUpload, UploadStatus};
use rsv_testkit::{cancel_of, new_booking};
use sqlx::Row;
use uuid::Uuid;

async fn store_or_skip() -> anyhow::Result<Option<Arc<PgStore>>> {
    let url = match std::env::var(rsv_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: RSV_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = rsv_db::connect(&url).await?;
    rsv_db::migrate(&pool).await?;
    Ok(Some(Arc::new(PgStore::new(pool))))
}

async fn run(store: &Arc<PgStore>, rows: &[rsv_schemas::ReservationRecord]) -> anyhow::Result<rsv_reconcile::BatchReport> {
    let batch = BatchReconciler::new(Arc::clone(store), tracing::Span::none());
    let upload = batch
        .tracker()
        .create(&NewUpload {
            file_name: format!("{}.csv", Uuid::new_v4().simple()),
            created_time: None,
            token: String::new(),
            path: String::new(),
        })
        .await?;
    Ok(batch.run(upload.id, rows).await?)
}

#[tokio::test]
async fn pg_new_then_cancel_soft_deletes_reservation() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    // Unique identity so reruns against a developer DB do not collide.
    let name = format!("Tanaka_{}", Uuid::new_v4().simple());
    let booking = new_booking(&name, "0312345678");

    let created = run(&store, &[booking.clone()]).await?;
    assert_eq!(created.final_status, UploadStatus::Complete, "{:?}", created.failures);

    let cancelled = run(&store, &[cancel_of(&booking)]).await?;
    assert_eq!(cancelled.final_status, UploadStatus::Complete, "{:?}", cancelled.failures);

    let row = sqlx::query(
        r#"
        select r.deleted, g.postal_code
        from reservations r
        join guests g on g.guest_id = r.guest_id
        where g.name = $1
        "#,
    )
    .bind(&name)
    .fetch_one(store.pool())
    .await?;
    assert!(row.try_get::<bool, _>("deleted")?);
    assert_eq!(row.try_get::<String, _>("postal_code")?, "123-4567");

    let again = run(&store, &[cancel_of(&booking)]).await?;
    assert_eq!(again.final_status, UploadStatus::Error);
    assert_eq!(again.failures[&0].error, RowError::NoMatchingReservation);
    Ok(())
}

#[tokio::test]
async fn pg_failed_row_rolls_back_and_lands_in_ledger() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };

    let name = format!("Noda_{}", Uuid::new_v4().simple());
    let mut bad = new_booking(&name, "0322220000");
    bad.sales_channel.clear();

    let report = run(&store, &[bad]).await?;
    assert_eq!(report.final_status, UploadStatus::Error);
    assert_eq!(report.ledger_ids.len(), 1);

    let guests: i64 = sqlx::query_scalar("select count(*) from guests where name = $1")
        .bind(&name)
        .fetch_one(store.pool())
        .await?;
    assert_eq!(guests, 0);

    let line: i32 = sqlx::query_scalar("select line_number from execution_errors where id = $1")
        .bind(report.ledger_ids[0])
        .fetch_one(store.pool())
        .await?;
    assert_eq!(line, 1);
    Ok(())
}
