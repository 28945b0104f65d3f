//! Accounts repository

use sqlx::{Pool, Postgres};

use super::conflict_on_unique;
use crate::{
    error::{AppError, AppResult},
    models::account::Account,
};

#[derive(Clone)]
pub struct AccountsRepository {
    pool: Pool<Postgres>,
}

impl AccountsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account with id {} not found", id)))
    }

    /// Usernames compare case-insensitively
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn get_by_member(&self, member_id: i32) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE member_id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Create an inactive account
    pub async fn create(&self, member_id: i32, username: &str, password_hash: &str, is_staff: bool) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (member_id, username, password_hash, is_active, is_staff)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING *
            "#,
        )
        .bind(member_id)
        .bind(username)
        .bind(password_hash)
        .bind(is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Account already exists"))
    }

    pub async fn activate(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET is_active = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_login(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> AppResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    /// Overwrite the permission flags of one account
    pub async fn set_flags(&self, id: i32, is_active: bool, is_staff: bool) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET is_active = $1, is_staff = $2 WHERE id = $3")
            .bind(is_active)
            .bind(is_staff)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
