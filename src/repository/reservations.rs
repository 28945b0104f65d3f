//! Reservations repository

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use super::items::{lending_states_on, lock_items};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ApprovalStatus,
        item::{Item, LendingState},
        reservation::{CreateReservation, Reservation, ReservationDetails},
    },
};

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_reservation(&self, id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    pub async fn get(&self, id: i32) -> AppResult<ReservationDetails> {
        let reservation = self.get_reservation(id).await?;
        self.details(reservation).await
    }

    async fn details(&self, reservation: Reservation) -> AppResult<ReservationDetails> {
        let reserved_item_ids = sqlx::query_scalar::<_, i32>(
            "SELECT item_id FROM reservation_items WHERE reservation_id = $1 ORDER BY item_id",
        )
        .bind(reservation.id)
        .fetch_all(&self.pool)
        .await?;

        let borrow_record_ids = sqlx::query_scalar::<_, i32>(
            "SELECT borrow_record_id FROM reservation_borrow_records WHERE reservation_id = $1 ORDER BY borrow_record_id",
        )
        .bind(reservation.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ReservationDetails {
            reservation,
            reserved_item_ids,
            borrow_record_ids,
        })
    }

    /// Reservations by window start, optionally in one status
    pub async fn list(&self, status: Option<ApprovalStatus>) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE ($1::text IS NULL OR approval_status = $1)
            ORDER BY date_to_borrow, id
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    pub async fn create(
        &self,
        data: &CreateReservation,
        item_ids: &[i32],
        internal_member_id: Option<i32>,
    ) -> AppResult<ReservationDetails> {
        let mut tx = self.pool.begin().await?;

        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (is_external, internal_member_id, borrower_name, contact_email,
                contact_info, date_to_borrow, date_to_return, additional_details, approval_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(internal_member_id.is_none())
        .bind(internal_member_id)
        .bind(data.borrower_name.trim())
        .bind(data.contact_email.trim())
        .bind(&data.contact_info)
        .bind(data.date_to_borrow)
        .bind(data.date_to_return)
        .bind(data.additional_details.as_deref().unwrap_or(""))
        .bind(ApprovalStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO reservation_items (reservation_id, item_id)
            SELECT $1, item_id FROM UNNEST($2::int[]) AS item_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(reservation.id)
        .bind(item_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.details(reservation).await
    }

    /// Move a reservation from `from` to `to`; fails if it is no longer in `from`
    pub async fn transition(
        &self,
        id: i32,
        from: ApprovalStatus,
        to: ApprovalStatus,
        comments: Option<&str>,
    ) -> AppResult<Reservation> {
        let mut conn = self.pool.acquire().await?;
        transition(&mut conn, id, from, to, comments).await
    }

    /// Approve a pending reservation once `check` accepts the lending state of
    /// its items. The items stay locked until the approval is committed.
    pub async fn approve<F>(
        &self,
        id: i32,
        comments: Option<&str>,
        today: NaiveDate,
        check: F,
    ) -> AppResult<Reservation>
    where
        F: FnOnce(&[Item], &HashMap<i32, LendingState>) -> AppResult<()>,
    {
        let mut tx = self.pool.begin().await?;
        let item_ids = sqlx::query_scalar::<_, i32>(
            "SELECT item_id FROM reservation_items WHERE reservation_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let items = lock_items(&mut tx, &item_ids).await?;
        let states = lending_states_on(&mut tx, &item_ids, today).await?;
        check(&items, &states)?;

        let reservation = transition(&mut tx, id, ApprovalStatus::Pending, ApprovalStatus::Approved, comments).await?;
        tx.commit().await?;
        Ok(reservation)
    }

    /// Link handed-over borrow records and mark the reservation active
    pub async fn activate(&self, id: i32, borrow_record_ids: &[i32]) -> AppResult<ReservationDetails> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO reservation_borrow_records (reservation_id, borrow_record_id)
            SELECT $1, record_id FROM UNNEST($2::int[]) AS record_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(borrow_record_ids)
        .execute(&mut *tx)
        .await?;

        let reservation = sqlx::query_as::<_, Reservation>(
            "UPDATE reservations SET active = TRUE, status_update_datetime = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.details(reservation).await
    }
}

async fn transition(
    conn: &mut PgConnection,
    id: i32,
    from: ApprovalStatus,
    to: ApprovalStatus,
    comments: Option<&str>,
) -> AppResult<Reservation> {
    sqlx::query_as::<_, Reservation>(
        r#"
        UPDATE reservations
        SET approval_status = $3, status_update_datetime = NOW(),
            librarian_comments = COALESCE($4, librarian_comments)
        WHERE id = $1 AND approval_status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(comments)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("Reservation {} changed status concurrently", id)))
}
