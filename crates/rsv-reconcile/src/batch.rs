//! Batch reconciliation: one upload transaction, many rows.
//!
//! Rows are applied in file order. Each failure is captured with its row
//! index and the batch keeps going. At the end the upload is either
//! completed (no failures) or marked `ERROR` and every failure is written to
//! the error ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use rsv_schemas::{NewExecutionError, ReservationRecord, UploadStatus};
use serde::Serialize;
use tracing::{error, info, warn, Instrument, Span};

use crate::error::{LifecycleError, RowError};
use crate::ledger::ErrorLedger;
use crate::processor::{InBatchIndex, RowOutcome, RowProcessor};
use crate::store::ReservationStore;
use crate::tracker::UploadTracker;

/// One failed row, as reported to the caller and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based line within the batch.
    pub line: usize,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(serialize_with = "as_display")]
    pub error: RowError,
}

fn as_display<S: serde::Serializer>(e: &RowError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

impl RowFailure {
    fn new(index: usize, record: &ReservationRecord, error: RowError) -> Self {
        let phone = if record.holder_phone.trim().is_empty() {
            record.phone.trim()
        } else {
            record.holder_phone.trim()
        };
        Self {
            line: index + 1,
            customer_name: record.holder.trim().to_string(),
            customer_phone: phone.to_string(),
            error,
        }
    }

    fn to_ledger(&self, upload_id: i64) -> NewExecutionError {
        NewExecutionError {
            upload_id,
            line_number: i32::try_from(self.line).unwrap_or(i32::MAX),
            customer_name: self.customer_name.clone(),
            customer_phone: self.customer_phone.clone(),
            message: self.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub upload_id: i64,
    pub rows_total: usize,
    pub created: usize,
    pub cancelled: usize,
    /// Keyed by 0-based row index.
    pub failures: BTreeMap<usize, RowFailure>,
    /// Ledger ids actually written. May be shorter than `failures` when a
    /// ledger write failed.
    pub ledger_ids: Vec<i64>,
    pub final_status: UploadStatus,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BatchReconciler<S> {
    processor: RowProcessor<S>,
    tracker: UploadTracker<S>,
    ledger: ErrorLedger<S>,
    span: Span,
}

impl<S> Clone for BatchReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            tracker: self.tracker.clone(),
            ledger: self.ledger.clone(),
            span: self.span.clone(),
        }
    }
}

impl<S: ReservationStore> BatchReconciler<S> {
    pub fn new(store: Arc<S>, span: Span) -> Self {
        Self {
            processor: RowProcessor::new(Arc::clone(&store), span.clone()),
            tracker: UploadTracker::new(Arc::clone(&store), span.clone()),
            ledger: ErrorLedger::new(store, span.clone()),
            span,
        }
    }

    pub fn tracker(&self) -> &UploadTracker<S> {
        &self.tracker
    }

    pub fn ledger(&self) -> &ErrorLedger<S> {
        &self.ledger
    }

    /// Reconcile `records` under upload `upload_id`.
    ///
    /// A started batch always runs every row; stopping is decided before a
    /// file is picked up, never between its rows.
    pub async fn run(
        &self,
        upload_id: i64,
        records: &[ReservationRecord],
    ) -> Result<BatchReport, LifecycleError> {
        self.run_inner(upload_id, records)
            .instrument(self.span.clone())
            .await
    }

    async fn run_inner(
        &self,
        upload_id: i64,
        records: &[ReservationRecord],
    ) -> Result<BatchReport, LifecycleError> {
        info!(upload_id, rows = records.len(), "batch/start");

        let mut index = InBatchIndex::new();
        let mut failures = BTreeMap::new();
        let (mut created, mut cancelled) = (0usize, 0usize);

        for (i, record) in records.iter().enumerate() {
            match self.processor.apply(record, &index).await {
                Ok(RowOutcome::Created { reservation_id, .. }) => {
                    index.remember(record, reservation_id);
                    created += 1;
                }
                Ok(RowOutcome::Cancelled { .. }) => cancelled += 1,
                Err(e) => {
                    warn!(
                        upload_id,
                        line = i + 1,
                        category = e.category(),
                        error = %e,
                        "batch/row failed"
                    );
                    failures.insert(i, RowFailure::new(i, record, e));
                }
            }
        }

        let mut report = BatchReport {
            upload_id,
            rows_total: records.len(),
            created,
            cancelled,
            failures,
            ledger_ids: Vec::new(),
            final_status: UploadStatus::Complete,
        };

        if report.failures.is_empty() {
            self.tracker.finish(upload_id).await.map_err(|e| {
                error!(upload_id, error = %e, "batch/finish failed");
                e
            })?;
            info!(upload_id, created, cancelled, "batch/complete");
            return Ok(report);
        }

        report.final_status = UploadStatus::Error;
        let marked = self.tracker.mark_error(upload_id).await;
        if let Err(e) = &marked {
            error!(upload_id, error = %e, "batch/mark_error failed");
        }

        // Ledger writes are attempted even when marking failed; losing a
        // ledger entry is logged, never fatal.
        for failure in report.failures.values() {
            match self.ledger.record(&failure.to_ledger(upload_id)).await {
                Ok(id) => report.ledger_ids.push(id),
                Err(e) => error!(
                    upload_id,
                    line = failure.line,
                    error = %format!("{e:#}"),
                    "batch/ledger write failed"
                ),
            }
        }

        marked?;
        info!(
            upload_id,
            created,
            cancelled,
            failed = report.failures.len(),
            "batch/error"
        );
        Ok(report)
    }
}
