//! Internal borrow records repository

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use super::{
    conflict_on_unique,
    items::{lending_states_on, lock_items},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowRecord, BorrowRecordDetails},
        item::{Item, LendingState},
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT br.*, i.name AS item_name,
           COALESCE(NULLIF(m.preferred_name, ''), m.first_name) || ' ' || m.last_name AS member_name,
           m.email_address AS member_email
    FROM borrow_records br
    JOIN items i ON i.id = br.item_id
    JOIN members m ON m.id = br.borrowing_member_id
"#;

/// Fields shared by every record created in one lending
pub struct NewBorrow<'a> {
    pub member_id: i32,
    pub date_borrowed: NaiveDate,
    pub due_date: NaiveDate,
    pub gatekeeper_id: i32,
    pub member_address: &'a str,
    pub member_phone_number: &'a str,
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    pub async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// One record per item, all or nothing. The items stay locked from the
    /// moment `check` sees their lending state until the records are committed.
    pub async fn create_many<F>(&self, item_ids: &[i32], borrow: &NewBorrow<'_>, check: F) -> AppResult<Vec<BorrowRecord>>
    where
        F: FnOnce(&[Item], &HashMap<i32, LendingState>) -> AppResult<()>,
    {
        let mut tx = self.pool.begin().await?;
        let items = lock_items(&mut tx, item_ids).await?;
        let states = lending_states_on(&mut tx, item_ids, borrow.date_borrowed).await?;
        check(&items, &states)?;

        let mut records = Vec::with_capacity(item_ids.len());

        for item_id in item_ids {
            let record = sqlx::query_as::<_, BorrowRecord>(
                r#"
                INSERT INTO borrow_records (borrowing_member_id, item_id, date_borrowed, due_date,
                                            auth_gatekeeper_borrow_id, member_address, member_phone_number)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(borrow.member_id)
            .bind(item_id)
            .bind(borrow.date_borrowed)
            .bind(borrow.due_date)
            .bind(borrow.gatekeeper_id)
            .bind(borrow.member_address)
            .bind(borrow.member_phone_number)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "Item is already lent out"))?;
            records.push(record);
        }

        tx.commit().await?;
        Ok(records)
    }

    /// Mark unreturned records as returned, returning the updated rows
    pub async fn mark_returned(&self, ids: &[i32], day: NaiveDate, gatekeeper_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET date_returned = $2, auth_gatekeeper_return_id = $3
            WHERE id = ANY($1) AND date_returned IS NULL
            RETURNING *
            "#,
        )
        .bind(ids)
        .bind(day)
        .bind(gatekeeper_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn verify_returned(&self, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>(
            "UPDATE borrow_records SET verified_returned = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    /// Unreturned records with a due date before `today`
    pub async fn overdue(&self, today: NaiveDate) -> AppResult<Vec<BorrowRecordDetails>> {
        let sql = format!(
            "{} WHERE br.date_returned IS NULL AND br.due_date < $1 ORDER BY br.due_date, br.id",
            DETAILS_SELECT
        );
        let records = sqlx::query_as::<_, BorrowRecordDetails>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Unreturned records due exactly on `day`
    pub async fn due_on(&self, day: NaiveDate) -> AppResult<Vec<BorrowRecordDetails>> {
        let sql = format!(
            "{} WHERE br.date_returned IS NULL AND br.due_date = $1 ORDER BY br.borrowing_member_id, br.id",
            DETAILS_SELECT
        );
        let records = sqlx::query_as::<_, BorrowRecordDetails>(&sql)
            .bind(day)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    pub async fn open_for_member(&self, member_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT * FROM borrow_records
            WHERE borrowing_member_id = $1 AND date_returned IS NULL
            ORDER BY due_date, id
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Full borrowing history of a member, newest first
    pub async fn for_member(&self, member_id: i32) -> AppResult<Vec<BorrowRecordDetails>> {
        let sql = format!(
            "{} WHERE br.borrowing_member_id = $1 ORDER BY br.date_borrowed DESC, br.id DESC",
            DETAILS_SELECT
        );
        let records = sqlx::query_as::<_, BorrowRecordDetails>(&sql)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}
