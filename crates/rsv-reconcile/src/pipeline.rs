//! Ingest pipeline: file -> parser -> upload transaction -> batch.
//!
//! Used by the daemon for polled files and API submissions, and by the CLI
//! for one-shot ingests.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rsv_csv::{CsvError, SiteController};
use rsv_schemas::{DiscoveredFile, NewUpload, UploadStatus};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, Span};

use crate::batch::{BatchReconciler, RowFailure};
use crate::store::ReservationStore;

/// Summary of one ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub upload_id: i64,
    pub file_name: String,
    pub token: String,
    pub status: UploadStatus,
    pub rows_total: usize,
    pub created: usize,
    pub cancelled: usize,
    pub failures: Vec<RowFailure>,
    /// Set when the file could not be parsed at all.
    pub parse_error: Option<String>,
}

pub struct IngestPipeline<S> {
    batch: BatchReconciler<S>,
    stop: watch::Receiver<bool>,
    span: Span,
}

impl<S> Clone for IngestPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            batch: self.batch.clone(),
            stop: self.stop.clone(),
            span: self.span.clone(),
        }
    }
}

impl<S: ReservationStore> IngestPipeline<S> {
    pub fn new(store: Arc<S>, stop: watch::Receiver<bool>, span: Span) -> Self {
        Self {
            batch: BatchReconciler::new(store, span.clone()),
            stop,
            span,
        }
    }

    pub fn batch(&self) -> &BatchReconciler<S> {
        &self.batch
    }

    /// `true` once shutdown was requested. No new file is started after that.
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Ingest a file found by the poller. The file's mtime becomes the
    /// upload's created time, which later seeds the watermark.
    ///
    /// `None` when shutdown was already requested; nothing is recorded and
    /// the file is picked up again after restart.
    pub async fn ingest_discovered(
        &self,
        file: &DiscoveredFile,
        site_controller: SiteController,
    ) -> Result<Option<IngestOutcome>> {
        let upload = NewUpload {
            file_name: file.name.clone(),
            created_time: Some(file.modified_utc),
            token: String::new(),
            path: file.path.display().to_string(),
        };
        self.ingest(upload, &file.path, site_controller).await
    }

    /// Ingest a file that was submitted through the API and already saved
    /// to `path`. An unknown site controller is rejected before the upload
    /// is recorded. `None` when shutdown was already requested.
    pub async fn submit_upload(
        &self,
        path: &Path,
        token: &str,
        site_controller: &str,
    ) -> Result<Option<IngestOutcome>> {
        let sc = SiteController::parse(site_controller)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let upload = NewUpload {
            file_name,
            created_time: None,
            token: token.to_string(),
            path: path.display().to_string(),
        };
        self.ingest(upload, path, sc).await
    }

    async fn ingest(
        &self,
        upload: NewUpload,
        path: &Path,
        sc: SiteController,
    ) -> Result<Option<IngestOutcome>> {
        if self.is_stopped() {
            info!(parent: &self.span, file = %upload.file_name, "ingest/not started: stopping");
            return Ok(None);
        }

        let tracker = self.batch.tracker();
        let row = tracker
            .create(&upload)
            .await
            .context("create upload transaction failed")?;

        let records = match sc.parser().parse_path(path) {
            Ok(records) => records,
            Err(parse_err) => {
                return self.fail_unparsed(row.id, &upload, parse_err).await.map(Some)
            }
        };

        let report = self
            .batch
            .run(row.id, &records)
            .await
            .with_context(|| format!("reconcile upload {} failed", row.id))?;

        info!(
            parent: &self.span,
            upload_id = row.id,
            file = %upload.file_name,
            status = report.final_status.as_str(),
            "ingest/done"
        );
        Ok(Some(IngestOutcome {
            upload_id: row.id,
            file_name: upload.file_name,
            token: upload.token,
            status: report.final_status,
            rows_total: report.rows_total,
            created: report.created,
            cancelled: report.cancelled,
            failures: report.failures.into_values().collect(),
            parse_error: None,
        }))
    }

    async fn fail_unparsed(
        &self,
        upload_id: i64,
        upload: &NewUpload,
        parse_err: CsvError,
    ) -> Result<IngestOutcome> {
        error!(parent: &self.span, upload_id, file = %upload.file_name, error = %parse_err, "ingest/parse failed");
        self.batch
            .tracker()
            .mark_error(upload_id)
            .await
            .with_context(|| format!("mark upload {upload_id} ERROR failed"))?;
        Ok(IngestOutcome {
            upload_id,
            file_name: upload.file_name.clone(),
            token: upload.token.clone(),
            status: UploadStatus::Error,
            rows_total: 0,
            created: 0,
            cancelled: 0,
            failures: Vec::new(),
            parse_error: Some(parse_err.to_string()),
        })
    }
}
