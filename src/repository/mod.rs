//! Repository layer for database operations

pub mod accounts;
pub mod blog;
pub mod borrows;
pub mod external_forms;
pub mod items;
pub mod job_runs;
pub mod members;
pub mod ranks;
pub mod reservations;
pub mod tags;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub members: members::MembersRepository,
    pub ranks: ranks::RanksRepository,
    pub accounts: accounts::AccountsRepository,
    pub items: items::ItemsRepository,
    pub tags: tags::TagsRepository,
    pub borrows: borrows::BorrowsRepository,
    pub external_forms: external_forms::ExternalFormsRepository,
    pub reservations: reservations::ReservationsRepository,
    pub blog: blog::BlogRepository,
    pub job_runs: job_runs::JobRunsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            members: members::MembersRepository::new(pool.clone()),
            ranks: ranks::RanksRepository::new(pool.clone()),
            accounts: accounts::AccountsRepository::new(pool.clone()),
            items: items::ItemsRepository::new(pool.clone()),
            tags: tags::TagsRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            external_forms: external_forms::ExternalFormsRepository::new(pool.clone()),
            reservations: reservations::ReservationsRepository::new(pool.clone()),
            blog: blog::BlogRepository::new(pool.clone()),
            job_runs: job_runs::JobRunsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connectivity check for the readiness endpoint
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Row offset of a 1-based page; pages past the addressable range are a validation error
pub(crate) fn page_offset(page: i64, per_page: i64) -> crate::error::AppResult<i64> {
    page.max(1)
        .checked_sub(1)
        .and_then(|p| p.checked_mul(per_page))
        .ok_or_else(|| crate::error::AppError::Validation("page: out of range".to_string()))
}

/// Map a unique-constraint violation to a Conflict error
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> crate::error::AppError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            crate::error::AppError::Conflict(message.to_string())
        }
        _ => crate::error::AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20).unwrap(), 0);
        assert_eq!(page_offset(3, 25).unwrap(), 50);
        assert_eq!(page_offset(-4, 25).unwrap(), 0);
    }

    #[test]
    fn test_huge_page_is_rejected() {
        let err = page_offset(i64::MAX, 20).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));
    }
}
