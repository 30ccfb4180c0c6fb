//! Upload-transaction lifecycle: `before -> complete | ERROR`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rsv_schemas::{NewUpload, UploadStatus, UploadTransaction};
use tracing::{info, warn, Span};

use crate::error::LifecycleError;
use crate::store::ReservationStore;

pub struct UploadTracker<S> {
    store: Arc<S>,
    span: Span,
}

impl<S> Clone for UploadTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            span: self.span.clone(),
        }
    }
}

impl<S: ReservationStore> UploadTracker<S> {
    pub fn new(store: Arc<S>, span: Span) -> Self {
        Self { store, span }
    }

    /// Record a new upload in `before`.
    pub async fn create(&self, upload: &NewUpload) -> Result<UploadTransaction, LifecycleError> {
        let row = self
            .store
            .insert_upload(upload)
            .await
            .map_err(LifecycleError::Storage)?;
        info!(parent: &self.span, upload_id = row.id, file = %row.file_name, "upload/create");
        Ok(row)
    }

    /// `before -> complete`. A terminal upload is never re-completed.
    pub async fn finish(&self, id: i64) -> Result<(), LifecycleError> {
        let current = self.fetch(id).await?;
        match current.status {
            UploadStatus::Complete => return Err(LifecycleError::AlreadyComplete(id)),
            UploadStatus::Error => return Err(LifecycleError::AlreadyFailed(id)),
            UploadStatus::Before => {}
        }

        let moved = self
            .store
            .complete_upload_if_before(id)
            .await
            .map_err(LifecycleError::Storage)?;
        if !moved {
            // Lost a race with another writer; report what it left behind.
            let now = self.fetch(id).await?;
            return Err(match now.status {
                UploadStatus::Error => LifecycleError::AlreadyFailed(id),
                _ => LifecycleError::AlreadyComplete(id),
            });
        }
        info!(parent: &self.span, upload_id = id, "upload/complete");
        Ok(())
    }

    /// Any non-complete state -> `ERROR`. Upserts when the upload row is
    /// missing; repeated calls are no-ops.
    pub async fn mark_error(&self, id: i64) -> Result<(), LifecycleError> {
        let existing = self
            .store
            .fetch_upload(id)
            .await
            .map_err(LifecycleError::Storage)?;
        match existing.map(|u| u.status) {
            Some(UploadStatus::Complete) => return Err(LifecycleError::AlreadyComplete(id)),
            Some(UploadStatus::Error) => return Ok(()),
            Some(UploadStatus::Before) => {}
            None => warn!(parent: &self.span, upload_id = id, "upload/mark_error on missing row"),
        }

        let written = self
            .store
            .upsert_upload_error(id)
            .await
            .map_err(LifecycleError::Storage)?;
        if written == 0 {
            return Err(LifecycleError::AlreadyComplete(id));
        }
        info!(parent: &self.span, upload_id = id, "upload/error");
        Ok(())
    }

    pub async fn fetch(&self, id: i64) -> Result<UploadTransaction, LifecycleError> {
        self.store
            .fetch_upload(id)
            .await
            .map_err(LifecycleError::Storage)?
            .ok_or(LifecycleError::NotFound(id))
    }

    /// Seed for the file watermark.
    pub async fn latest_created_time(&self) -> Result<Option<DateTime<Utc>>, LifecycleError> {
        self.store
            .latest_upload_created_time()
            .await
            .map_err(LifecycleError::Storage)
    }

    pub async fn latest_by_token(&self) -> Result<Option<UploadTransaction>, LifecycleError> {
        self.store
            .latest_upload_by_token()
            .await
            .map_err(LifecycleError::Storage)
    }

    pub async fn by_token(&self, token: &str) -> Result<Vec<UploadTransaction>, LifecycleError> {
        self.store
            .uploads_by_token(token)
            .await
            .map_err(LifecycleError::Storage)
    }
}
