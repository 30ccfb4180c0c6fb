//! Guest identity resolution.

use chrono::{DateTime, Utc};
use rsv_schemas::{Guest, GuestContact, NewGuest, ReservationRecord};
use tracing::{debug, warn, Span};

use crate::postal;
use crate::store::{GuestMatchKey, StoreTx};

/// Gender code stored for guests created from an export row (the exports
/// carry no gender column).
pub const DEFAULT_GENDER: i16 = 1;

#[derive(Clone)]
pub struct GuestResolver {
    span: Span,
}

impl GuestResolver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn match_key(record: &ReservationRecord) -> GuestMatchKey {
        GuestMatchKey {
            name: record.name.trim().to_string(),
            name_kana: record.name_kana.trim().to_string(),
            phone: record.phone.trim().to_string(),
            postal_code: postal::normalize(&record.postal_code),
        }
    }

    /// Find the existing guest for this record. When several guests match,
    /// the one with the smallest id wins.
    pub async fn find<T: StoreTx>(
        &self,
        tx: &mut T,
        record: &ReservationRecord,
    ) -> anyhow::Result<Option<Guest>> {
        let key = Self::match_key(record);
        let mut found = tx.find_guests(&key).await?;
        if found.len() > 1 {
            warn!(
                parent: &self.span,
                candidates = found.len(),
                picked = found[0].guest_id,
                "guest/ambiguous"
            );
        }
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    pub fn new_guest(record: &ReservationRecord, now: DateTime<Utc>) -> NewGuest {
        NewGuest {
            name: record.name.trim().to_string(),
            name_kana: record.name_kana.trim().to_string(),
            gender: DEFAULT_GENDER,
            email: record.email.trim().to_string(),
            phone: record.phone.trim().to_string(),
            postal_code: postal::normalize(&record.postal_code),
            address: record.address.trim().to_string(),
            now_utc: now,
        }
    }

    pub fn contact(record: &ReservationRecord, now: DateTime<Utc>) -> GuestContact {
        GuestContact {
            email: record.email.trim().to_string(),
            phone: record.phone.trim().to_string(),
            postal_code: postal::normalize(&record.postal_code),
            address: record.address.trim().to_string(),
            now_utc: now,
        }
    }

    pub async fn insert<T: StoreTx>(
        &self,
        tx: &mut T,
        record: &ReservationRecord,
        now: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let id = tx.insert_guest(&Self::new_guest(record, now)).await?;
        debug!(parent: &self.span, guest_id = id, "guest/insert");
        Ok(id)
    }

    pub async fn refresh_contact<T: StoreTx>(
        &self,
        tx: &mut T,
        guest_id: i64,
        record: &ReservationRecord,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        tx.update_guest_contact(guest_id, &Self::contact(record, now))
            .await?;
        debug!(parent: &self.span, guest_id, "guest/update_contact");
        Ok(())
    }
}
