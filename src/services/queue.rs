//! Email task queue stored in a Redis list

use redis::{AsyncCommands, Client};

use super::email::EmailJob;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct EmailQueue {
    client: Client,
    key: String,
}

impl EmailQueue {
    /// Connect and check the server answers
    pub async fn new(url: &str, key: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let queue = Self {
            client,
            key: key.to_string(),
        };
        queue.ping().await?;
        Ok(queue)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn push(&self, job: &EmailJob) -> AppResult<()> {
        let payload = serde_json::to_string(job)
            .map_err(|e| AppError::Internal(format!("Failed to encode email job: {}", e)))?;
        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(&self.key, payload).await?;
        Ok(())
    }

    pub async fn push_all(&self, jobs: &[EmailJob]) -> AppResult<usize> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let payloads = jobs
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to encode email job: {}", e)))?;
        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(&self.key, payloads).await?;
        Ok(jobs.len())
    }

    /// Oldest job, waiting up to `timeout_secs`. Undecodable payloads are dropped.
    pub async fn pop(&self, timeout_secs: u64) -> AppResult<Option<EmailJob>> {
        let mut conn = self.connection().await?;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        match popped {
            Some((_, payload)) => match serde_json::from_str::<EmailJob>(&payload) {
                Ok(job) => Ok(Some(job)),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed email job");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}
