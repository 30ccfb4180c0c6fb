//! Persistent per-row failure ledger.

use std::sync::Arc;

use rsv_schemas::{ErrorStatus, ExecutionError, NewExecutionError};
use tracing::{info, Span};

use crate::store::ReservationStore;

pub struct ErrorLedger<S> {
    store: Arc<S>,
    span: Span,
}

impl<S> Clone for ErrorLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            span: self.span.clone(),
        }
    }
}

impl<S: ReservationStore> ErrorLedger<S> {
    pub fn new(store: Arc<S>, span: Span) -> Self {
        Self { store, span }
    }

    /// Insert one entry as `unresolved`.
    pub async fn record(&self, err: &NewExecutionError) -> anyhow::Result<i64> {
        let id = self.store.insert_execution_error(err).await?;
        info!(
            parent: &self.span,
            upload_id = err.upload_id,
            line = err.line_number,
            id,
            "ledger/record"
        );
        Ok(id)
    }

    pub async fn list_unresolved(&self) -> anyhow::Result<Vec<ExecutionError>> {
        self.store
            .list_execution_errors(ErrorStatus::Unresolved)
            .await
    }

    pub async fn list(&self, status: ErrorStatus) -> anyhow::Result<Vec<ExecutionError>> {
        self.store.list_execution_errors(status).await
    }

    /// Mark every unresolved entry resolved.
    pub async fn resolve_all(&self) -> anyhow::Result<u64> {
        let n = self.store.resolve_execution_errors().await?;
        info!(parent: &self.span, resolved = n, "ledger/resolve_all");
        Ok(n)
    }
}
