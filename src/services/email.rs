//! Email composition and SMTP delivery

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{
    config::{EmailConfig, SiteConfig},
    error::{AppError, AppResult},
    models::{blog::BlogPost, borrow::BorrowRecordDetails, member::Member},
};

/// One email waiting in the task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Delivery attempts that already failed
    #[serde(default)]
    pub attempts: u32,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            attempts: 0,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &EmailJob) -> AppResult<()>;
}

/// Mailer over an SMTP relay
#[derive(Clone)]
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, job: &EmailJob) -> AppResult<Message> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Phylactery");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Email(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(&job.to)
            .map_err(|e| AppError::Email(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&job.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(job.body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><pre>{}</pre></body></html>"#,
                                escape_html(&job.body)
                            )),
                    ),
            )
            .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Email(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, job: &EmailJob) -> AppResult<()> {
        let message = self.build_message(job)?;
        let transport = self.transport()?;

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task panicked: {}", e)))?
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>")
}

// =============================================================================
// Templates
// =============================================================================

pub fn compose_activation(site: &SiteConfig, to: &str, username: &str, token: &str) -> EmailJob {
    EmailJob::new(
        to,
        format!("Activate your {} account", site.club_name),
        format!(
            "Hi {username},\n\n\
             Follow this link to activate your account:\n\
             {base}/account/activate?token={token}\n\n\
             If you did not sign up, you can ignore this email.\n",
            username = username,
            base = site.base_url,
            token = token
        ),
    )
}

pub fn compose_password_reset(site: &SiteConfig, to: &str, username: &str, token: &str) -> EmailJob {
    EmailJob::new(
        to,
        format!("{} password reset", site.club_name),
        format!(
            "Hi {username},\n\n\
             Someone asked to reset the password for your account.\n\
             Use this link to choose a new one:\n\
             {base}/account/password-reset?token={token}\n\n\
             If this wasn't you, no action is needed.\n",
            username = username,
            base = site.base_url,
            token = token
        ),
    )
}

pub fn compose_email_preferences(site: &SiteConfig, member: &Member, token: &str) -> EmailJob {
    EmailJob::new(
        &member.email_address,
        format!("{} email preferences", site.club_name),
        format!(
            "Hi {name},\n\n\
             Use this link to change which emails you get from {club}:\n\
             {base}/members/email-preferences?token={token}\n\n\
             The link is valid for three days.\n",
            name = member.greeting_name(),
            club = site.club_name,
            base = site.base_url,
            token = token
        ),
    )
}

/// `due_word` is "tomorrow" or "today"
pub fn compose_due_reminder(
    site: &SiteConfig,
    to: &str,
    member_name: &str,
    records: &[&BorrowRecordDetails],
    due_word: &str,
) -> EmailJob {
    let items: Vec<String> = records
        .iter()
        .map(|r| format!("  - {} (due {})", r.item_name, r.record.due_date))
        .collect();
    EmailJob::new(
        to,
        format!("{}: library items due {}", site.club_name, due_word),
        format!(
            "Hi {name},\n\n\
             The following items you borrowed from the {club} library are due {due_word}:\n\n\
             {items}\n\n\
             Please return them to the clubroom, or talk to a gatekeeper about an extension.\n",
            name = member_name,
            club = site.club_name,
            due_word = due_word,
            items = items.join("\n")
        ),
    )
}

pub fn compose_blog_post(site: &SiteConfig, to: &str, post: &BlogPost) -> EmailJob {
    EmailJob::new(
        to,
        format!("{} - {} News", post.title, site.club_name),
        format!(
            "{title}\n\n{short}\n\n{body}\n\n\
             Read it online: {base}/blog/{slug}\n\
             Change your email preferences: {base}/members/email-preferences\n",
            title = post.title,
            short = post.short_description,
            body = post.body,
            base = site.base_url,
            slug = post.slug_title
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn site() -> SiteConfig {
        SiteConfig {
            club_name: "Unigames".into(),
            base_url: "https://unigames.example".into(),
        }
    }

    #[test]
    fn test_blog_subject() {
        let post = BlogPost {
            id: 1,
            title: "Welcome Week".into(),
            slug_title: "welcome-week".into(),
            short_description: "Come say hi".into(),
            author: "Secretary".into(),
            publish_on: Utc::now(),
            body: "Stall on the oval".into(),
        };
        let job = compose_blog_post(&site(), "a@b.c", &post);
        assert_eq!(job.subject, "Welcome Week - Unigames News");
        assert!(job.body.contains("https://unigames.example/blog/welcome-week"));
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_activation_link() {
        let job = compose_activation(&site(), "a@b.c", "gk", "tok");
        assert!(job.body.contains("https://unigames.example/account/activate?token=tok"));
    }

    #[test]
    fn test_job_without_attempts_deserializes() {
        let job: EmailJob =
            serde_json::from_str(r#"{"to":"a@b.c","subject":"s","body":"b"}"#).unwrap();
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>\nc&d"), "a&lt;b&gt;<br>c&amp;d");
    }
}
