//! External borrowing forms repository

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use super::items::{lending_states_on, lock_items};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::FormStatus,
        external::{CreateExternalForm, ExternalBorrowingForm, ExternalBorrowingItemRecord, ExternalFormDetails},
        item::{Item, LendingState},
    },
};

#[derive(Clone)]
pub struct ExternalFormsRepository {
    pool: Pool<Postgres>,
}

impl ExternalFormsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_form(&self, id: i32) -> AppResult<ExternalBorrowingForm> {
        sqlx::query_as::<_, ExternalBorrowingForm>("SELECT * FROM external_borrowing_forms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("External borrowing form with id {} not found", id)))
    }

    pub async fn get(&self, id: i32) -> AppResult<ExternalFormDetails> {
        let form = self.get_form(id).await?;
        let requested_items = self.item_records(id).await?;
        Ok(ExternalFormDetails { form, requested_items })
    }

    pub async fn item_records(&self, form_id: i32) -> AppResult<Vec<ExternalBorrowingItemRecord>> {
        let records = sqlx::query_as::<_, ExternalBorrowingItemRecord>(
            "SELECT * FROM external_borrowing_item_records WHERE form_id = $1 ORDER BY id",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Forms, newest first, optionally in one status
    pub async fn list(&self, status: Option<FormStatus>) -> AppResult<Vec<ExternalBorrowingForm>> {
        let forms = sqlx::query_as::<_, ExternalBorrowingForm>(
            r#"
            SELECT * FROM external_borrowing_forms
            WHERE ($1::text IS NULL OR form_status = $1)
            ORDER BY form_submitted_date DESC, id DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(forms)
    }

    /// Store a new unapproved form with one record per requested item
    pub async fn create(&self, data: &CreateExternalForm, item_ids: &[i32], today: NaiveDate) -> AppResult<ExternalFormDetails> {
        let mut tx = self.pool.begin().await?;

        let form = sqlx::query_as::<_, ExternalBorrowingForm>(
            r#"
            INSERT INTO external_borrowing_forms (applicant_name, applicant_org, event_details,
                contact_phone, contact_email, requested_borrow_date, form_status, form_submitted_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.applicant_name.trim())
        .bind(data.applicant_org.as_deref().unwrap_or("").trim())
        .bind(&data.event_details)
        .bind(data.contact_phone.trim())
        .bind(data.contact_email.trim())
        .bind(data.requested_borrow_date)
        .bind(FormStatus::Unapproved)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        let requested_items = sqlx::query_as::<_, ExternalBorrowingItemRecord>(
            r#"
            INSERT INTO external_borrowing_item_records (form_id, item_id)
            SELECT $1, item_id FROM UNNEST($2::int[]) AS item_id
            RETURNING *
            "#,
        )
        .bind(form.id)
        .bind(item_ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ExternalFormDetails { form, requested_items })
    }

    /// Deny an unapproved form
    pub async fn deny(&self, id: i32, comments: &str) -> AppResult<ExternalBorrowingForm> {
        let mut conn = self.pool.acquire().await?;
        decide(&mut conn, id, FormStatus::Denied, None, comments).await
    }

    /// Approve an unapproved form once `check` accepts the lending state of its
    /// items. The items stay locked until the decision is committed.
    pub async fn approve<F>(
        &self,
        id: i32,
        due_date: NaiveDate,
        comments: &str,
        today: NaiveDate,
        check: F,
    ) -> AppResult<ExternalBorrowingForm>
    where
        F: FnOnce(&[Item], &HashMap<i32, LendingState>) -> AppResult<()>,
    {
        let mut tx = self.pool.begin().await?;
        let item_ids = sqlx::query_scalar::<_, i32>(
            "SELECT item_id FROM external_borrowing_item_records WHERE form_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let items = lock_items(&mut tx, &item_ids).await?;
        let states = lending_states_on(&mut tx, &item_ids, today).await?;
        check(&items, &states)?;

        let form = decide(&mut tx, id, FormStatus::Approved, Some(due_date), comments).await?;
        tx.commit().await?;
        Ok(form)
    }

    pub async fn set_status(&self, id: i32, status: FormStatus) -> AppResult<()> {
        sqlx::query("UPDATE external_borrowing_forms SET form_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hand over records of a form that are not yet out
    pub async fn mark_borrowed(
        &self,
        form_id: i32,
        record_ids: &[i32],
        day: NaiveDate,
        gatekeeper_id: i32,
        borrower_name: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE external_borrowing_item_records
            SET date_borrowed = $3, auth_gatekeeper_borrow_id = $4, borrower_name = $5
            WHERE form_id = $1 AND id = ANY($2) AND date_borrowed IS NULL
            "#,
        )
        .bind(form_id)
        .bind(record_ids)
        .bind(day)
        .bind(gatekeeper_id)
        .bind(borrower_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Take back records of a form that are out
    pub async fn mark_returned(
        &self,
        form_id: i32,
        record_ids: &[i32],
        day: NaiveDate,
        gatekeeper_id: i32,
        returner_name: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE external_borrowing_item_records
            SET date_returned = $3, auth_gatekeeper_return_id = $4, returner_name = $5
            WHERE form_id = $1 AND id = ANY($2)
              AND date_borrowed IS NOT NULL AND date_returned IS NULL
            "#,
        )
        .bind(form_id)
        .bind(record_ids)
        .bind(day)
        .bind(gatekeeper_id)
        .bind(returner_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Record the librarian decision on an unapproved form
async fn decide(
    conn: &mut PgConnection,
    id: i32,
    status: FormStatus,
    due_date: Option<NaiveDate>,
    comments: &str,
) -> AppResult<ExternalBorrowingForm> {
    sqlx::query_as::<_, ExternalBorrowingForm>(
        r#"
        UPDATE external_borrowing_forms
        SET form_status = $2, due_date = COALESCE($3, due_date), librarian_comments = $4
        WHERE id = $1 AND form_status = 'U'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(due_date)
    .bind(comments)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("Form {} was decided concurrently", id)))
}
