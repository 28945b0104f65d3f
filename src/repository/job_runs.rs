//! Once-a-day bookkeeping for background jobs

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::error::AppResult;

#[derive(Clone)]
pub struct JobRunsRepository {
    pool: Pool<Postgres>,
}

impl JobRunsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Record that `job` runs on `day`. False if it already ran (or is running) that day.
    pub async fn claim(&self, job: &str, day: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query("INSERT INTO job_runs (job, run_date) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(job)
            .bind(day)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
