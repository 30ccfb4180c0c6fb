use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rsv_reconcile::ReservationStore;
use rsv_schemas::{
    ErrorStatus, ExecutionError, NewExecutionError, NewUpload, UploadStatus, UploadTransaction,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::tx::PgTx;

/// [`ReservationStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const UPLOAD_COLS: &str = "id, file_name, created_time, token, path, status";

fn upload_from_row(row: &PgRow) -> Result<UploadTransaction> {
    let status: String = row.try_get("status")?;
    Ok(UploadTransaction {
        id: row.try_get("id")?,
        file_name: row.try_get("file_name")?,
        created_time: row.try_get("created_time")?,
        token: row.try_get("token")?,
        path: row.try_get("path")?,
        status: UploadStatus::parse(&status)
            .ok_or_else(|| anyhow!("invalid upload status in db: {status}"))?,
    })
}

#[async_trait]
impl ReservationStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        let tx = self.pool.begin().await.context("begin row tx failed")?;
        Ok(PgTx::new(tx))
    }

    async fn insert_upload(&self, upload: &NewUpload) -> Result<UploadTransaction> {
        let row = sqlx::query(&format!(
            r#"
            insert into csv_upload_transactions (file_name, created_time, token, path, status)
            values ($1, $2, $3, $4, 'before')
            returning {UPLOAD_COLS}
            "#
        ))
        .bind(&upload.file_name)
        .bind(upload.created_time)
        .bind(&upload.token)
        .bind(&upload.path)
        .fetch_one(&self.pool)
        .await
        .context("insert_upload failed")?;
        upload_from_row(&row)
    }

    async fn fetch_upload(&self, id: i64) -> Result<Option<UploadTransaction>> {
        let row = sqlx::query(&format!(
            "select {UPLOAD_COLS} from csv_upload_transactions where id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch_upload failed")?;
        row.as_ref().map(upload_from_row).transpose()
    }

    async fn complete_upload_if_before(&self, id: i64) -> Result<bool> {
        let res = sqlx::query(
            r#"
            update csv_upload_transactions
            set status = 'complete',
                updated_at_utc = now()
            where id = $1 and status = 'before'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("complete_upload update failed")?;
        Ok(res.rows_affected() == 1)
    }

    async fn upsert_upload_error(&self, id: i64) -> Result<u64> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            insert into csv_upload_transactions (id, status)
            values ($1, 'ERROR')
            on conflict (id) do update
                set status = 'ERROR',
                    updated_at_utc = now()
                where csv_upload_transactions.status <> 'complete'
            returning (xmax = 0)
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("upsert_upload_error failed")?;

        match inserted {
            None => Ok(0),
            Some(false) => Ok(1),
            Some(true) => {
                // Explicit id bypassed the sequence; keep it ahead of the table.
                sqlx::query(
                    r#"
                    select setval(
                        pg_get_serial_sequence('csv_upload_transactions', 'id'),
                        (select max(id) from csv_upload_transactions)
                    )
                    "#,
                )
                .execute(&self.pool)
                .await
                .context("upload id sequence resync failed")?;
                debug!(upload_id = id, "upsert_upload_error inserted missing row");
                Ok(1)
            }
        }
    }

    async fn latest_upload_created_time(&self) -> Result<Option<DateTime<Utc>>> {
        let ts: Option<DateTime<Utc>> =
            sqlx::query_scalar("select max(created_time) from csv_upload_transactions")
                .fetch_one(&self.pool)
                .await
                .context("latest_upload_created_time failed")?;
        Ok(ts)
    }

    async fn latest_upload_by_token(&self) -> Result<Option<UploadTransaction>> {
        let row = sqlx::query(&format!(
            r#"
            select {UPLOAD_COLS}
            from csv_upload_transactions
            where token <> ''
            order by token desc, id desc
            limit 1
            "#
        ))
        .fetch_optional(&self.pool)
        .await
        .context("latest_upload_by_token failed")?;
        row.as_ref().map(upload_from_row).transpose()
    }

    async fn uploads_by_token(&self, token: &str) -> Result<Vec<UploadTransaction>> {
        let rows = sqlx::query(&format!(
            "select {UPLOAD_COLS} from csv_upload_transactions where token = $1 order by id"
        ))
        .bind(token)
        .fetch_all(&self.pool)
        .await
        .context("uploads_by_token failed")?;
        rows.iter().map(upload_from_row).collect()
    }

    async fn insert_execution_error(&self, err: &NewExecutionError) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            insert into execution_errors
                (upload_id, line_number, customer_name, customer_phone, message, status)
            values ($1, $2, $3, $4, $5, 'unresolved')
            returning id
            "#,
        )
        .bind(err.upload_id)
        .bind(err.line_number)
        .bind(&err.customer_name)
        .bind(&err.customer_phone)
        .bind(&err.message)
        .fetch_one(&self.pool)
        .await
        .context("insert_execution_error failed")?;
        Ok(id)
    }

    async fn list_execution_errors(&self, status: ErrorStatus) -> Result<Vec<ExecutionError>> {
        let rows = sqlx::query(
            r#"
            select e.id,
                   e.upload_id,
                   coalesce(u.file_name, '') as file_name,
                   e.line_number,
                   e.customer_name,
                   e.customer_phone,
                   e.message,
                   e.status
            from execution_errors e
            left join csv_upload_transactions u on u.id = e.upload_id
            where e.status = $1
            order by e.upload_id, e.line_number, e.id
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .context("list_execution_errors failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            out.push(ExecutionError {
                id: row.try_get("id")?,
                upload_id: row.try_get("upload_id")?,
                file_name: row.try_get("file_name")?,
                line_number: row.try_get("line_number")?,
                customer_name: row.try_get("customer_name")?,
                customer_phone: row.try_get("customer_phone")?,
                message: row.try_get("message")?,
                status: ErrorStatus::parse(&status)
                    .ok_or_else(|| anyhow!("invalid execution error status in db: {status}"))?,
            });
        }
        Ok(out)
    }

    async fn resolve_execution_errors(&self) -> Result<u64> {
        let res = sqlx::query(
            r#"
            update execution_errors
            set status = 'resolved',
                updated_at_utc = now()
            where status = 'unresolved'
            "#,
        )
        .execute(&self.pool)
        .await
        .context("resolve_execution_errors failed")?;
        Ok(res.rows_affected())
    }
}
