use anyhow::{Context, Result};
use async_trait::async_trait;
use rsv_reconcile::{CancelCriteria, GuestMatchKey, StoreTx};
use rsv_schemas::{Guest, GuestContact, NewGuest, NewReservation};
use sqlx::{Acquire, Postgres, Row, Transaction};

/// One row's Postgres transaction.
///
/// Lookups whose failure the engine tolerates (payment method, plan) run
/// inside a savepoint so a failed statement does not abort the outer
/// transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn get_or_create_payment_method(&mut self, name: &str) -> Result<i64> {
        let mut sp = (&mut self.tx).begin().await.context("savepoint failed")?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            insert into payment_methods (name)
            values ($1)
            on conflict (name) do nothing
            returning payment_method_id
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *sp)
        .await
        .context("insert payment_method failed")?;

        let id = match inserted {
            Some(id) => id,
            None => sqlx::query_scalar(
                "select payment_method_id from payment_methods where name = $1",
            )
            .bind(name)
            .fetch_one(&mut *sp)
            .await
            .context("select payment_method failed")?,
        };

        sp.commit().await.context("release savepoint failed")?;
        Ok(id)
    }

    async fn get_or_create_channel(&mut self, name: &str) -> Result<i64> {
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            insert into sales_channels (name)
            values ($1)
            on conflict (name) do nothing
            returning channel_id
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .context("insert sales_channel failed")?;

        if let Some(id) = inserted {
            return Ok(id);
        }
        let id: i64 = sqlx::query_scalar("select channel_id from sales_channels where name = $1")
            .bind(name)
            .fetch_one(&mut *self.tx)
            .await
            .context("select sales_channel failed")?;
        Ok(id)
    }

    async fn find_plan(&mut self, code: &str, name: &str) -> Result<Option<i64>> {
        let mut sp = (&mut self.tx).begin().await.context("savepoint failed")?;
        let id: Option<i64> = sqlx::query_scalar(
            "select plan_id from plans where code = $1 and name = $2 order by plan_id limit 1",
        )
        .bind(code)
        .bind(name)
        .fetch_optional(&mut *sp)
        .await
        .context("select plan failed")?;
        sp.commit().await.context("release savepoint failed")?;
        Ok(id)
    }

    async fn find_guests(&mut self, key: &GuestMatchKey) -> Result<Vec<Guest>> {
        let rows = sqlx::query(
            r#"
            select guest_id, name, name_kana, gender, email, phone, postal_code, address,
                   created_at_utc, updated_at_utc
            from guests
            where name = $1
              and name_kana = $2
              and (phone = $3 or postal_code = $4)
            order by guest_id
            "#,
        )
        .bind(&key.name)
        .bind(&key.name_kana)
        .bind(&key.phone)
        .bind(&key.postal_code)
        .fetch_all(&mut *self.tx)
        .await
        .context("find_guests failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Guest {
                guest_id: row.try_get("guest_id")?,
                name: row.try_get("name")?,
                name_kana: row.try_get("name_kana")?,
                gender: row.try_get("gender")?,
                email: row.try_get("email")?,
                phone: row.try_get("phone")?,
                postal_code: row.try_get("postal_code")?,
                address: row.try_get("address")?,
                created_at_utc: row.try_get("created_at_utc")?,
                updated_at_utc: row.try_get("updated_at_utc")?,
            });
        }
        Ok(out)
    }

    async fn insert_guest(&mut self, g: &NewGuest) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            insert into guests
                (name, name_kana, gender, email, phone, postal_code, address,
                 created_at_utc, updated_at_utc)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            returning guest_id
            "#,
        )
        .bind(&g.name)
        .bind(&g.name_kana)
        .bind(g.gender)
        .bind(&g.email)
        .bind(&g.phone)
        .bind(&g.postal_code)
        .bind(&g.address)
        .bind(g.now_utc)
        .fetch_one(&mut *self.tx)
        .await
        .context("insert_guest failed")?;
        Ok(id)
    }

    async fn update_guest_contact(&mut self, guest_id: i64, c: &GuestContact) -> Result<()> {
        sqlx::query(
            r#"
            update guests
            set email = $2,
                phone = $3,
                postal_code = $4,
                address = $5,
                updated_at_utc = $6
            where guest_id = $1
            "#,
        )
        .bind(guest_id)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.postal_code)
        .bind(&c.address)
        .bind(c.now_utc)
        .execute(&mut *self.tx)
        .await
        .context("update_guest_contact failed")?;
        Ok(())
    }

    async fn insert_reservation(&mut self, r: &NewReservation) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            insert into reservations
                (guest_id, holder, holder_kana, stay_from, stay_to, stay_days, rooms,
                 guests, guests_male, guests_female, has_child, plan_id, plan_name,
                 channel_id, payment_method_id, coupon, payment_status, existing_guest,
                 reserved_on, deleted, created_at_utc, updated_at_utc)
            values
                ($1, $2, $3, $4, $5, $6, $7,
                 $8, $9, $10, $11, $12, $13,
                 $14, $15, $16, $17, $18,
                 $19, false, $20, $20)
            returning reservation_id
            "#,
        )
        .bind(r.guest_id)
        .bind(&r.holder)
        .bind(&r.holder_kana)
        .bind(r.stay_from)
        .bind(r.stay_to)
        .bind(r.stay_days)
        .bind(r.rooms)
        .bind(r.guests)
        .bind(r.guests_male)
        .bind(r.guests_female)
        .bind(r.has_child)
        .bind(r.plan_id)
        .bind(&r.plan_name)
        .bind(r.channel_id)
        .bind(r.payment_method_id)
        .bind(r.coupon.as_str())
        .bind(r.payment_status.as_str())
        .bind(r.existing_guest)
        .bind(r.reserved_on)
        .bind(r.now_utc)
        .fetch_one(&mut *self.tx)
        .await
        .context("insert_reservation failed")?;
        Ok(id)
    }

    async fn find_guest_ids_by_phone(
        &mut self,
        name: &str,
        name_kana: &str,
        phone: &str,
    ) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            select guest_id
            from guests
            where name = $1 and name_kana = $2 and phone = $3
            order by guest_id
            "#,
        )
        .bind(name)
        .bind(name_kana)
        .bind(phone)
        .fetch_all(&mut *self.tx)
        .await
        .context("find_guest_ids_by_phone failed")?;
        Ok(ids)
    }

    async fn find_cancellable_reservations(&mut self, c: &CancelCriteria) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            select reservation_id
            from reservations
            where guest_id = any($1)
              and stay_to = $2
              and stay_days = $3
              and rooms = $4
              and guests = $5
              and not deleted
            order by reservation_id
            "#,
        )
        .bind(&c.guest_ids)
        .bind(c.stay_to)
        .bind(c.stay_days)
        .bind(c.rooms)
        .bind(c.guests)
        .fetch_all(&mut *self.tx)
        .await
        .context("find_cancellable_reservations failed")?;
        Ok(ids)
    }

    async fn flag_reservation_deleted(&mut self, reservation_id: i64) -> Result<u64> {
        let res = sqlx::query(
            r#"
            update reservations
            set deleted = true,
                updated_at_utc = now()
            where reservation_id = $1 and not deleted
            "#,
        )
        .bind(reservation_id)
        .execute(&mut *self.tx)
        .await
        .context("flag_reservation_deleted failed")?;
        Ok(res.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("row tx commit failed")
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.context("row tx rollback failed")
    }
}
