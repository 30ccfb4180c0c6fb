//! Per-row reconciliation.
//!
//! Each record runs in its own storage transaction: commit on success,
//! rollback on any [`RowError`]. Rows never see each other's uncommitted
//! writes, so a failure leaves no partial guest or reservation behind.

use std::sync::Arc;

use chrono::Utc;
use rsv_schemas::{CouponState, NewReservation, NoticeKind, PaymentStatus, ReservationRecord};
use tracing::{debug, error, warn, Instrument, Span};

use crate::error::{ReferenceError, RowError};
use crate::guest::GuestResolver;
use crate::reference::ReferenceResolver;
use crate::store::{CancelCriteria, ReservationStore, StoreTx};
use crate::validation;

/// What a successfully applied row did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Created {
        reservation_id: i64,
        guest_id: i64,
        existing_guest: bool,
    },
    Cancelled {
        reservation_id: i64,
        /// Located through the rows created earlier in the same batch.
        from_batch: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HolderKey {
    name: String,
    name_kana: String,
    phone: String,
}

impl HolderKey {
    fn of(r: &ReservationRecord) -> Self {
        Self {
            name: r.name.trim().to_string(),
            name_kana: r.name_kana.trim().to_string(),
            phone: r.phone.trim().to_string(),
        }
    }
}

/// Reservations created so far in the current batch, in row order. Used as
/// the fallback when a `cancel` row finds nothing in the store.
#[derive(Debug, Default)]
pub struct InBatchIndex {
    created: Vec<(HolderKey, i64)>,
}

impl InBatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, record: &ReservationRecord, reservation_id: i64) {
        self.created.push((HolderKey::of(record), reservation_id));
    }

    /// Earliest reservation created this batch for the same `(name, kana, phone)`.
    pub fn find(&self, record: &ReservationRecord) -> Option<i64> {
        let key = HolderKey::of(record);
        self.created
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

pub struct RowProcessor<S> {
    store: Arc<S>,
    reference: ReferenceResolver,
    guests: GuestResolver,
    span: Span,
}

impl<S> Clone for RowProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reference: self.reference.clone(),
            guests: self.guests.clone(),
            span: self.span.clone(),
        }
    }
}

impl<S: ReservationStore> RowProcessor<S> {
    pub fn new(store: Arc<S>, span: Span) -> Self {
        Self {
            store,
            reference: ReferenceResolver::new(span.clone()),
            guests: GuestResolver::new(span.clone()),
            span,
        }
    }

    /// Apply one record in its own transaction.
    pub async fn apply(
        &self,
        record: &ReservationRecord,
        batch: &InBatchIndex,
    ) -> Result<RowOutcome, RowError> {
        if let NoticeKind::Other(raw) = &record.notice {
            return Err(RowError::UnknownNoticeType(raw.clone()));
        }

        self.apply_in_tx(record, batch)
            .instrument(self.span.clone())
            .await
    }

    async fn apply_in_tx(
        &self,
        record: &ReservationRecord,
        batch: &InBatchIndex,
    ) -> Result<RowOutcome, RowError> {
        let mut tx = self.store.begin().await.map_err(|e| {
            error!(error = %format!("{e:#}"), "row/begin failed");
            RowError::Transaction("begin")
        })?;

        let applied = match record.notice {
            NoticeKind::New => self.apply_new(&mut tx, record).await,
            _ => self.apply_cancel(&mut tx, record, batch).await,
        };

        match applied {
            Ok(outcome) => {
                tx.commit().await.map_err(|e| {
                    error!(error = %format!("{e:#}"), "row/commit failed");
                    RowError::Transaction("commit")
                })?;
                Ok(outcome)
            }
            Err(row_err) => {
                if let Err(e) = tx.rollback().await {
                    error!(error = %format!("{e:#}"), "row/rollback failed");
                }
                Err(row_err)
            }
        }
    }

    async fn apply_new(
        &self,
        tx: &mut S::Tx,
        r: &ReservationRecord,
    ) -> Result<RowOutcome, RowError> {
        let stay_from = validation::parse_stay_from(&r.stay_from, &r.check_in_time)
            .ok_or(RowError::CheckInDateInvalid)?;
        let stay_to = validation::parse_date(&r.stay_to).ok_or(RowError::CheckOutDateInvalid)?;
        let reserved_on =
            validation::parse_date(&r.reserved_on).ok_or(RowError::ReservationDateInvalid)?;

        let missing = validation::missing_for_new(r);
        if !missing.is_empty() {
            return Err(RowError::Validation(missing));
        }

        let channel_id = self
            .reference
            .resolve_channel(tx, &r.sales_channel)
            .await
            .map_err(|e| {
                if let ReferenceError::Storage(_) = &e {
                    error!(error = %e, "row/channel lookup failed");
                }
                RowError::ChannelInvalid
            })?;

        // Payment method and plan are best-effort: a failure leaves the
        // reference empty and the row continues.
        let payment_method_id = match self
            .reference
            .resolve_payment_method(tx, &r.payment_method)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "row/payment method unresolved");
                None
            }
        };
        let plan_id = match self
            .reference
            .resolve_plan(tx, &r.product_code, &r.product_name)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "row/plan unresolved");
                None
            }
        };

        let now = Utc::now();
        let existing = self.guests.find(tx, r).await.map_err(|e| {
            error!(error = %format!("{e:#}"), "row/guest lookup failed");
            RowError::GuestLookupFailed
        })?;
        let (guest_id, existing_guest) = match existing {
            Some(g) => {
                self.guests
                    .refresh_contact(tx, g.guest_id, r, now)
                    .await
                    .map_err(|e| {
                        error!(error = %format!("{e:#}"), "row/guest update failed");
                        RowError::GuestUpdateFailed
                    })?;
                (g.guest_id, true)
            }
            None => {
                let id = self.guests.insert(tx, r, now).await.map_err(|e| {
                    error!(error = %format!("{e:#}"), "row/guest insert failed");
                    RowError::GuestInsertFailed
                })?;
                (id, false)
            }
        };

        let reservation = NewReservation {
            guest_id,
            holder: r.holder.trim().to_string(),
            holder_kana: r.holder_kana.trim().to_string(),
            stay_from,
            stay_to,
            stay_days: r.stay_days,
            rooms: r.rooms,
            guests: r.computed_guest_count(),
            guests_male: r.guests_male,
            guests_female: r.guests_female,
            has_child: r.has_child(),
            plan_id,
            plan_name: r.product_name.trim().to_string(),
            channel_id,
            payment_method_id,
            coupon: CouponState::None,
            payment_status: PaymentStatus::Unpaid,
            existing_guest,
            reserved_on,
            now_utc: now,
        };
        let reservation_id = tx.insert_reservation(&reservation).await.map_err(|e| {
            error!(error = %format!("{e:#}"), "row/reservation insert failed");
            RowError::ReservationInsertFailed
        })?;

        debug!(reservation_id, guest_id, existing_guest, "row/created");
        Ok(RowOutcome::Created {
            reservation_id,
            guest_id,
            existing_guest,
        })
    }

    async fn apply_cancel(
        &self,
        tx: &mut S::Tx,
        r: &ReservationRecord,
        batch: &InBatchIndex,
    ) -> Result<RowOutcome, RowError> {
        let missing = validation::missing_for_cancel(r);
        if !missing.is_empty() {
            return Err(RowError::Validation(missing));
        }
        let stay_to = validation::parse_date(&r.stay_to).ok_or(RowError::CheckOutDateInvalid)?;

        let guest_ids = tx
            .find_guest_ids_by_phone(r.name.trim(), r.name_kana.trim(), r.phone.trim())
            .await
            .map_err(|e| {
                error!(error = %format!("{e:#}"), "row/cancel guest lookup failed");
                RowError::LookupFailed
            })?;

        let candidates = if guest_ids.is_empty() {
            Vec::new()
        } else {
            let criteria = CancelCriteria {
                guest_ids,
                stay_to,
                stay_days: r.stay_days,
                rooms: r.rooms,
                // Matched against the stored male + female count.
                guests: r.computed_guest_count(),
            };
            tx.find_cancellable_reservations(&criteria)
                .await
                .map_err(|e| {
                    error!(error = %format!("{e:#}"), "row/cancel reservation lookup failed");
                    RowError::LookupFailed
                })?
        };

        let (reservation_id, from_batch) = match candidates.as_slice() {
            [] => (
                batch.find(r).ok_or(RowError::NoMatchingReservation)?,
                true,
            ),
            [only] => (*only, false),
            many => {
                warn!(candidates = many.len(), "row/cancel ambiguous");
                return Err(RowError::AmbiguousReservation);
            }
        };

        let flagged = tx
            .flag_reservation_deleted(reservation_id)
            .await
            .map_err(|e| {
                error!(error = %format!("{e:#}"), "row/cancel update failed");
                RowError::CancelFailed
            })?;
        if flagged == 0 {
            return Err(RowError::NoMatchingReservation);
        }

        debug!(reservation_id, from_batch, "row/cancelled");
        Ok(RowOutcome::Cancelled {
            reservation_id,
            from_batch,
        })
    }
}
