//! Background work: the email worker and the periodic jobs

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{Days, NaiveDate, Utc};
use tokio::{
    task::JoinHandle,
    time::{Instant, Interval},
};

use crate::{
    config::{JobsConfig, SiteConfig},
    error::AppResult,
    models::borrow::BorrowRecordDetails,
};

use super::{
    email::{compose_blog_post, compose_due_reminder, EmailJob, Mailer},
    today, Services,
};

/// Seconds the worker blocks on the queue before checking again
const POP_TIMEOUT_SECS: u64 = 5;

/// `job_runs` key for the reminder and permission sync run
const DAILY_JOB: &str = "daily";

/// What happened to a job handed to the mailer
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Retry(EmailJob),
    Dropped,
}

/// Send one job, deciding whether a failure goes back on the queue
pub async fn deliver(job: EmailJob, mailer: &dyn Mailer, max_attempts: u32) -> Delivery {
    match mailer.send(&job).await {
        Ok(()) => {
            tracing::debug!(to = %job.to, subject = %job.subject, "Email sent");
            Delivery::Sent
        }
        Err(e) => {
            let attempts = job.attempts + 1;
            if attempts >= max_attempts {
                tracing::error!(to = %job.to, attempts, error = %e, "Email dropped after repeated failures");
                Delivery::Dropped
            } else {
                tracing::warn!(to = %job.to, attempts, error = %e, "Email failed, will retry");
                Delivery::Retry(EmailJob { attempts, ..job })
            }
        }
    }
}

/// Like `tokio::time::interval`, but the first tick is one full period away
pub fn delayed_interval(period: Duration) -> Interval {
    tokio::time::interval_at(Instant::now() + period, period)
}

/// One reminder per member, listing all their items due that day
pub fn due_reminders(site: &SiteConfig, records: &[BorrowRecordDetails], due_word: &str) -> Vec<EmailJob> {
    let mut by_member: BTreeMap<i32, Vec<&BorrowRecordDetails>> = BTreeMap::new();
    for record in records {
        by_member
            .entry(record.record.borrowing_member_id)
            .or_default()
            .push(record);
    }

    by_member
        .values()
        .map(|records| {
            let first = records[0];
            compose_due_reminder(site, &first.member_email, &first.member_name, records, due_word)
        })
        .collect()
}

/// Periodic jobs and the email worker
pub struct Scheduler {
    services: Services,
    config: JobsConfig,
    site: SiteConfig,
    mailer: Arc<dyn Mailer>,
}

impl Scheduler {
    pub fn new(services: Services, config: JobsConfig, site: SiteConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            services,
            config,
            site,
            mailer,
        }
    }

    /// Start every background task; nothing runs when jobs are disabled
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("Background jobs disabled");
            return Vec::new();
        }

        let me = Arc::new(self);
        let mut handles = Vec::new();

        let worker = me.clone();
        handles.push(tokio::spawn(async move { worker.run_email_worker().await }));

        let daily = me.clone();
        handles.push(tokio::spawn(async move {
            let mut checks = delayed_interval(Duration::from_secs(daily.config.daily_check_secs));
            loop {
                checks.tick().await;
                daily.run_daily().await;
            }
        }));

        let orders = me.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = delayed_interval(Duration::from_secs(orders.config.email_orders_interval_secs));
            loop {
                interval.tick().await;
                if let Err(e) = orders.process_email_orders().await {
                    tracing::error!(error = %e, "Email order job failed");
                }
            }
        }));

        tracing::info!(
            daily_check_secs = me.config.daily_check_secs,
            email_orders_interval_secs = me.config.email_orders_interval_secs,
            "Background jobs started"
        );
        handles
    }

    /// Reminders and permission sync, at most once per calendar day
    async fn run_daily(&self) {
        let day = today();
        match self.services.repository.job_runs.claim(DAILY_JOB, day).await {
            Ok(true) => tracing::info!(%day, "Running daily jobs"),
            Ok(false) => return,
            Err(e) => {
                tracing::error!(error = %e, "Could not record the daily job run");
                return;
            }
        }
        for (offset, due_word) in [(1, "tomorrow"), (0, "today")] {
            if let Err(e) = self.send_due_reminders(day, offset, due_word).await {
                tracing::error!(error = %e, due_word, "Due date reminder job failed");
            }
        }
        if let Err(e) = self.sync_permissions(day).await {
            tracing::error!(error = %e, "Permission sync job failed");
        }
    }

    async fn run_email_worker(&self) {
        tracing::info!("Email worker started");
        loop {
            let job = match self.services.queue.pop(POP_TIMEOUT_SECS).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Email queue unavailable");
                    tokio::time::sleep(Duration::from_secs(POP_TIMEOUT_SECS)).await;
                    continue;
                }
            };

            if let Delivery::Retry(job) = deliver(job, self.mailer.as_ref(), self.config.email_max_attempts).await {
                if let Err(e) = self.services.queue.push(&job).await {
                    tracing::error!(error = %e, to = %job.to, "Failed to re-queue email");
                }
            }
        }
    }

    /// Queue reminders for records due `offset_days` after `day`
    pub async fn send_due_reminders(&self, day: NaiveDate, offset_days: u64, due_word: &str) -> AppResult<usize> {
        let due = day.checked_add_days(Days::new(offset_days)).unwrap_or(day);
        let records = self.services.repository.borrows.due_on(due).await?;
        if records.is_empty() {
            tracing::info!(due_word, "No items due");
            return Ok(0);
        }

        let jobs = due_reminders(&self.site, &records, due_word);
        let queued = self.services.queue.push_all(&jobs).await?;
        tracing::info!(due_word, records = records.len(), reminders = queued, "Due date reminders queued");
        Ok(queued)
    }

    /// Queue emails for every ready blog order, then mark the orders sent
    pub async fn process_email_orders(&self) -> AppResult<usize> {
        let now = Utc::now();
        let blog = &self.services.repository.blog;
        let orders = blog.pending_orders(now).await?;

        let mut total = 0;
        for pending in orders.iter().filter(|o| o.is_ready(now)) {
            let recipients = self
                .services
                .repository
                .members
                .email_recipients(pending.order.audience, today())
                .await?;
            let jobs: Vec<EmailJob> = recipients
                .iter()
                .map(|m| compose_blog_post(&self.site, &m.email_address, &pending.post))
                .collect();
            let queued = self.services.queue.push_all(&jobs).await?;
            blog.mark_order_sent(pending.order.id, now).await?;

            tracing::info!(
                order_id = pending.order.id,
                post_id = pending.post.id,
                audience = %pending.order.audience,
                recipients = queued,
                "Email order sent"
            );
            total += queued;
        }
        Ok(total)
    }

    pub async fn sync_permissions(&self, day: NaiveDate) -> AppResult<()> {
        let report = self.services.accounts.sync_permissions(day).await?;
        if report.deactivated == 0 && report.staff_changed == 0 {
            tracing::info!(checked = report.checked, "No permissions to clean up");
        } else {
            tracing::info!(
                checked = report.checked,
                deactivated = report.deactivated,
                staff_changed = report.staff_changed,
                "Permissions cleaned up"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::borrow::BorrowRecord,
        services::email::MockMailer,
    };

    fn job() -> EmailJob {
        EmailJob::new("sam@example.com", "Hello", "Body")
    }

    #[test]
    fn test_successful_delivery() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(1).returning(|_| Ok(()));
        assert_eq!(tokio_test::block_on(deliver(job(), &mailer, 3)), Delivery::Sent);
    }

    #[tokio::test]
    async fn test_failure_is_retried_with_attempt_count() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(AppError::Email("relay down".into())));

        match deliver(job(), &mailer, 3).await {
            Delivery::Retry(retry) => assert_eq!(retry.attempts, 1),
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_dropped_at_max_attempts() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(AppError::Email("relay down".into())));

        let tired = EmailJob { attempts: 2, ..job() };
        assert_eq!(deliver(tired, &mailer, 3).await, Delivery::Dropped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_a_full_period() {
        let period = Duration::from_secs(3600);
        let start = Instant::now();
        let mut checks = delayed_interval(period);

        checks.tick().await;
        assert!(start.elapsed() >= period);

        checks.tick().await;
        assert!(start.elapsed() >= period * 2);
    }

    fn record(id: i32, member_id: i32, item: &str) -> BorrowRecordDetails {
        let day = NaiveDate::from_ymd_opt(2021, 5, 3).unwrap();
        BorrowRecordDetails {
            record: BorrowRecord {
                id,
                borrowing_member_id: member_id,
                item_id: id,
                date_borrowed: day,
                due_date: day,
                auth_gatekeeper_borrow_id: None,
                auth_gatekeeper_return_id: None,
                date_returned: None,
                member_address: String::new(),
                member_phone_number: String::new(),
                verified_returned: false,
            },
            item_name: item.to_string(),
            member_name: format!("Member {}", member_id),
            member_email: format!("m{}@example.com", member_id),
        }
    }

    #[test]
    fn test_reminders_grouped_per_member() {
        let site = SiteConfig {
            club_name: "Unigames".into(),
            base_url: "http://localhost".into(),
        };
        let records = vec![record(1, 5, "Catan"), record(2, 6, "Dune"), record(3, 5, "Azul")];
        let jobs = due_reminders(&site, &records, "tomorrow");

        assert_eq!(jobs.len(), 2);
        let first = jobs.iter().find(|j| j.to == "m5@example.com").unwrap();
        assert!(first.body.contains("Catan"));
        assert!(first.body.contains("Azul"));
        assert!(first.subject.contains("tomorrow"));
    }
}
