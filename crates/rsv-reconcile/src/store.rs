//! Storage seam for the reconciliation engine.
//!
//! [`ReservationStore`] covers the non-transactional bookkeeping (upload
//! lifecycle, error ledger); every reservation write goes through a
//! [`StoreTx`] scoped to exactly one CSV row. Implementations live in
//! `rsv-db` (Postgres) and `rsv-testkit` (in-memory).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rsv_schemas::{
    ErrorStatus, ExecutionError, Guest, GuestContact, NewExecutionError, NewGuest,
    NewReservation, NewUpload, UploadTransaction,
};

/// Identity lookup key for an incoming guest: exact `(name, kana)` and either
/// the phone or the normalized postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestMatchKey {
    pub name: String,
    pub name_kana: String,
    pub phone: String,
    /// `NNN-NNNN`
    pub postal_code: String,
}

/// Attributes a `cancel` row must match on an existing reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelCriteria {
    pub guest_ids: Vec<i64>,
    pub stay_to: NaiveDate,
    pub stay_days: i16,
    pub rooms: i16,
    pub guests: i16,
}

/// One row's storage transaction. Dropping it without `commit` must discard
/// its writes.
#[async_trait]
pub trait StoreTx: Send {
    /// Race-safe get-or-create keyed on the method name.
    async fn get_or_create_payment_method(&mut self, name: &str) -> Result<i64>;

    /// Race-safe get-or-create keyed on the channel name.
    async fn get_or_create_channel(&mut self, name: &str) -> Result<i64>;

    /// Pure lookup on `(code, name)`; never creates.
    async fn find_plan(&mut self, code: &str, name: &str) -> Result<Option<i64>>;

    /// Candidates ordered by `guest_id` ascending.
    async fn find_guests(&mut self, key: &GuestMatchKey) -> Result<Vec<Guest>>;

    async fn insert_guest(&mut self, guest: &NewGuest) -> Result<i64>;

    async fn update_guest_contact(&mut self, guest_id: i64, contact: &GuestContact) -> Result<()>;

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> Result<i64>;

    /// Guests matching `(name, kana, phone)` exactly, ordered by id.
    async fn find_guest_ids_by_phone(
        &mut self,
        name: &str,
        name_kana: &str,
        phone: &str,
    ) -> Result<Vec<i64>>;

    /// Ids of reservations not yet flagged deleted that match `criteria`.
    async fn find_cancellable_reservations(&mut self, criteria: &CancelCriteria) -> Result<Vec<i64>>;

    /// Set the soft-delete flag. Returns the number of rows updated.
    async fn flag_reservation_deleted(&mut self, reservation_id: i64) -> Result<u64>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync + 'static {
    type Tx: StoreTx + 'static;

    async fn begin(&self) -> Result<Self::Tx>;

    // --- upload transactions ---

    async fn insert_upload(&self, upload: &NewUpload) -> Result<UploadTransaction>;

    async fn fetch_upload(&self, id: i64) -> Result<Option<UploadTransaction>>;

    /// `before -> complete` as a single conditional write. Returns `false`
    /// when the row was not in `before` (or does not exist).
    async fn complete_upload_if_before(&self, id: i64) -> Result<bool>;

    /// Upsert `status = ERROR` unless the row is already `complete`.
    /// Returns the number of rows written (0 means the row is complete).
    async fn upsert_upload_error(&self, id: i64) -> Result<u64>;

    /// Created time of the most recently created upload that has one.
    async fn latest_upload_created_time(&self) -> Result<Option<DateTime<Utc>>>;

    /// Upload with the greatest non-empty correlation token.
    async fn latest_upload_by_token(&self) -> Result<Option<UploadTransaction>>;

    async fn uploads_by_token(&self, token: &str) -> Result<Vec<UploadTransaction>>;

    // --- execution error ledger ---

    async fn insert_execution_error(&self, err: &NewExecutionError) -> Result<i64>;

    /// Ordered by upload id, then line number.
    async fn list_execution_errors(&self, status: ErrorStatus) -> Result<Vec<ExecutionError>>;

    /// Bulk `unresolved -> resolved`. Returns the number of rows changed.
    async fn resolve_execution_errors(&self) -> Result<u64>;
}
