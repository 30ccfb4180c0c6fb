//! In-memory [`ReservationStore`].
//!
//! A row transaction works on a private copy of the row tables and writes
//! them back on commit; dropping or rolling back discards the copy. Ids come
//! from one shared counter and are never reused, like a database sequence.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rsv_reconcile::{CancelCriteria, GuestMatchKey, ReservationStore, StoreTx};
use rsv_schemas::{
    ErrorStatus, ExecutionError, Guest, GuestContact, NewExecutionError, NewGuest,
    NewReservation, NewUpload, PaymentStatus, Reservation, UploadStatus, UploadTransaction,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredError {
    pub id: i64,
    pub entry: NewExecutionError,
    pub status: ErrorStatus,
}

/// Switches that make selected store calls fail.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_guest_lookup: bool,
    pub fail_payment_method: bool,
    pub fail_reservation_insert: bool,
    pub fail_ledger_insert: bool,
    /// Cancel lookups see no reservations, forcing the in-batch fallback.
    pub hide_reservations_from_cancel_lookup: bool,
}

#[derive(Debug, Clone, Default)]
struct RowTables {
    guests: Vec<Guest>,
    reservations: Vec<Reservation>,
    payment_methods: Vec<(i64, String)>,
    channels: Vec<(i64, String)>,
    plans: Vec<Plan>,
}

#[derive(Debug, Default)]
struct Shared {
    rows: Mutex<RowTables>,
    uploads: Mutex<Vec<UploadTransaction>>,
    errors: Mutex<Vec<StoredError>>,
    faults: Mutex<Faults>,
    next_id: AtomicI64,
}

impl Shared {
    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct MemStore {
    shared: Arc<Shared>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, faults: Faults) {
        *lock(&self.shared.faults) = faults;
    }

    pub fn add_plan(&self, code: &str, name: &str) -> i64 {
        let id = self.shared.next_id();
        lock(&self.shared.rows).plans.push(Plan {
            id,
            code: code.to_string(),
            name: name.to_string(),
        });
        id
    }

    pub fn guests(&self) -> Vec<Guest> {
        lock(&self.shared.rows).guests.clone()
    }

    /// Insert a guest directly, bypassing the engine.
    pub fn seed_guest(&self, guest: &NewGuest) -> i64 {
        let id = self.shared.next_id();
        lock(&self.shared.rows).guests.push(guest_row(id, guest));
        id
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        lock(&self.shared.rows).reservations.clone()
    }

    pub fn payment_methods(&self) -> Vec<String> {
        lock(&self.shared.rows)
            .payment_methods
            .iter()
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn channels(&self) -> Vec<String> {
        lock(&self.shared.rows)
            .channels
            .iter()
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<UploadTransaction> {
        lock(&self.shared.uploads).clone()
    }

    pub fn upload(&self, id: i64) -> Option<UploadTransaction> {
        lock(&self.shared.uploads)
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    pub fn errors(&self) -> Vec<StoredError> {
        lock(&self.shared.errors).clone()
    }

    fn faults(&self) -> Faults {
        lock(&self.shared.faults).clone()
    }
}

fn guest_row(id: i64, g: &NewGuest) -> Guest {
    Guest {
        guest_id: id,
        name: g.name.clone(),
        name_kana: g.name_kana.clone(),
        gender: g.gender,
        email: g.email.clone(),
        phone: g.phone.clone(),
        postal_code: g.postal_code.clone(),
        address: g.address.clone(),
        created_at_utc: g.now_utc,
        updated_at_utc: g.now_utc,
    }
}

pub struct MemTx {
    shared: Arc<Shared>,
    staged: RowTables,
    faults: Faults,
}

impl MemTx {
    fn get_or_create(
        shared: &Shared,
        table: &mut Vec<(i64, String)>,
        name: &str,
    ) -> i64 {
        if let Some((id, _)) = table.iter().find(|(_, n)| n == name) {
            return *id;
        }
        let id = shared.next_id();
        table.push((id, name.to_string()));
        id
    }
}

#[async_trait]
impl StoreTx for MemTx {
    async fn get_or_create_payment_method(&mut self, name: &str) -> Result<i64> {
        if self.faults.fail_payment_method {
            bail!("injected: payment method");
        }
        Ok(Self::get_or_create(
            &self.shared,
            &mut self.staged.payment_methods,
            name,
        ))
    }

    async fn get_or_create_channel(&mut self, name: &str) -> Result<i64> {
        Ok(Self::get_or_create(
            &self.shared,
            &mut self.staged.channels,
            name,
        ))
    }

    async fn find_plan(&mut self, code: &str, name: &str) -> Result<Option<i64>> {
        Ok(self
            .staged
            .plans
            .iter()
            .find(|p| p.code == code && p.name == name)
            .map(|p| p.id))
    }

    async fn find_guests(&mut self, key: &GuestMatchKey) -> Result<Vec<Guest>> {
        if self.faults.fail_guest_lookup {
            bail!("injected: guest lookup");
        }
        let mut found: Vec<Guest> = self
            .staged
            .guests
            .iter()
            .filter(|g| {
                g.name == key.name
                    && g.name_kana == key.name_kana
                    && (g.phone == key.phone || g.postal_code == key.postal_code)
            })
            .cloned()
            .collect();
        found.sort_by_key(|g| g.guest_id);
        Ok(found)
    }

    async fn insert_guest(&mut self, guest: &NewGuest) -> Result<i64> {
        let id = self.shared.next_id();
        self.staged.guests.push(guest_row(id, guest));
        Ok(id)
    }

    async fn update_guest_contact(&mut self, guest_id: i64, contact: &GuestContact) -> Result<()> {
        let g = self
            .staged
            .guests
            .iter_mut()
            .find(|g| g.guest_id == guest_id)
            .ok_or_else(|| anyhow!("guest {guest_id} not found"))?;
        g.email = contact.email.clone();
        g.phone = contact.phone.clone();
        g.postal_code = contact.postal_code.clone();
        g.address = contact.address.clone();
        g.updated_at_utc = contact.now_utc;
        Ok(())
    }

    async fn insert_reservation(&mut self, r: &NewReservation) -> Result<i64> {
        if self.faults.fail_reservation_insert {
            bail!("injected: reservation insert");
        }
        let id = self.shared.next_id();
        self.staged.reservations.push(Reservation {
            reservation_id: id,
            guest_id: r.guest_id,
            holder: r.holder.clone(),
            holder_kana: r.holder_kana.clone(),
            stay_from: r.stay_from,
            stay_to: r.stay_to,
            stay_days: r.stay_days,
            rooms: r.rooms,
            guests: r.guests,
            has_child: r.has_child,
            plan_id: r.plan_id,
            channel_id: r.channel_id,
            payment_method_id: r.payment_method_id,
            payment_status: PaymentStatus::Unpaid,
            existing_guest: r.existing_guest,
            deleted: false,
        });
        Ok(id)
    }

    async fn find_guest_ids_by_phone(
        &mut self,
        name: &str,
        name_kana: &str,
        phone: &str,
    ) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .staged
            .guests
            .iter()
            .filter(|g| g.name == name && g.name_kana == name_kana && g.phone == phone)
            .map(|g| g.guest_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_cancellable_reservations(&mut self, c: &CancelCriteria) -> Result<Vec<i64>> {
        if self.faults.hide_reservations_from_cancel_lookup {
            return Ok(Vec::new());
        }
        Ok(self
            .staged
            .reservations
            .iter()
            .filter(|r| {
                !r.deleted
                    && c.guest_ids.contains(&r.guest_id)
                    && r.stay_to == c.stay_to
                    && r.stay_days == c.stay_days
                    && r.rooms == c.rooms
                    && r.guests == c.guests
            })
            .map(|r| r.reservation_id)
            .collect())
    }

    async fn flag_reservation_deleted(&mut self, reservation_id: i64) -> Result<u64> {
        let mut n = 0;
        for r in self
            .staged
            .reservations
            .iter_mut()
            .filter(|r| r.reservation_id == reservation_id)
        {
            r.deleted = true;
            n += 1;
        }
        Ok(n)
    }

    async fn commit(self) -> Result<()> {
        *lock(&self.shared.rows) = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for MemStore {
    type Tx = MemTx;

    async fn begin(&self) -> Result<MemTx> {
        Ok(MemTx {
            shared: Arc::clone(&self.shared),
            staged: lock(&self.shared.rows).clone(),
            faults: self.faults(),
        })
    }

    async fn insert_upload(&self, upload: &NewUpload) -> Result<UploadTransaction> {
        let row = UploadTransaction {
            id: self.shared.next_id(),
            file_name: upload.file_name.clone(),
            created_time: upload.created_time,
            token: upload.token.clone(),
            path: upload.path.clone(),
            status: UploadStatus::Before,
        };
        lock(&self.shared.uploads).push(row.clone());
        Ok(row)
    }

    async fn fetch_upload(&self, id: i64) -> Result<Option<UploadTransaction>> {
        Ok(self.upload(id))
    }

    async fn complete_upload_if_before(&self, id: i64) -> Result<bool> {
        let mut uploads = lock(&self.shared.uploads);
        match uploads
            .iter_mut()
            .find(|u| u.id == id && u.status == UploadStatus::Before)
        {
            Some(u) => {
                u.status = UploadStatus::Complete;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_upload_error(&self, id: i64) -> Result<u64> {
        let mut uploads = lock(&self.shared.uploads);
        if let Some(u) = uploads.iter_mut().find(|u| u.id == id) {
            if u.status == UploadStatus::Complete {
                return Ok(0);
            }
            u.status = UploadStatus::Error;
            return Ok(1);
        }
        self.shared.next_id.fetch_max(id, Ordering::SeqCst);
        uploads.push(UploadTransaction {
            id,
            file_name: String::new(),
            created_time: None,
            token: String::new(),
            path: String::new(),
            status: UploadStatus::Error,
        });
        Ok(1)
    }

    async fn latest_upload_created_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(lock(&self.shared.uploads)
            .iter()
            .filter_map(|u| u.created_time)
            .max())
    }

    async fn latest_upload_by_token(&self) -> Result<Option<UploadTransaction>> {
        Ok(lock(&self.shared.uploads)
            .iter()
            .filter(|u| !u.token.is_empty())
            .max_by(|a, b| a.token.cmp(&b.token).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn uploads_by_token(&self, token: &str) -> Result<Vec<UploadTransaction>> {
        Ok(lock(&self.shared.uploads)
            .iter()
            .filter(|u| u.token == token)
            .cloned()
            .collect())
    }

    async fn insert_execution_error(&self, err: &NewExecutionError) -> Result<i64> {
        if self.faults().fail_ledger_insert {
            bail!("injected: ledger insert");
        }
        // Mirrors the execution_errors -> csv_upload_transactions foreign key.
        if !lock(&self.shared.uploads)
            .iter()
            .any(|u| u.id == err.upload_id)
        {
            bail!(
                "insert execution_error failed: upload {} does not exist",
                err.upload_id
            );
        }
        let id = self.shared.next_id();
        lock(&self.shared.errors).push(StoredError {
            id,
            entry: err.clone(),
            status: ErrorStatus::Unresolved,
        });
        Ok(id)
    }

    async fn list_execution_errors(&self, status: ErrorStatus) -> Result<Vec<ExecutionError>> {
        let uploads = self.uploads();
        let mut out: Vec<ExecutionError> = lock(&self.shared.errors)
            .iter()
            .filter(|e| e.status == status)
            .map(|e| ExecutionError {
                id: e.id,
                upload_id: e.entry.upload_id,
                file_name: uploads
                    .iter()
                    .find(|u| u.id == e.entry.upload_id)
                    .map(|u| u.file_name.clone())
                    .unwrap_or_default(),
                line_number: e.entry.line_number,
                customer_name: e.entry.customer_name.clone(),
                customer_phone: e.entry.customer_phone.clone(),
                message: e.entry.message.clone(),
                status: e.status,
            })
            .collect();
        out.sort_by_key(|e| (e.upload_id, e.line_number, e.id));
        Ok(out)
    }

    async fn resolve_execution_errors(&self) -> Result<u64> {
        let mut n = 0;
        for e in lock(&self.shared.errors)
            .iter_mut()
            .filter(|e| e.status == ErrorStatus::Unresolved)
        {
            e.status = ErrorStatus::Resolved;
            n += 1;
        }
        Ok(n)
    }
}
