//! Blog posts and their email orders

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::EmailAudience;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BlogPost {
    pub id: i32,
    pub title: String,
    pub slug_title: String,
    /// Plain preview shown in the post list
    pub short_description: String,
    pub author: String,
    /// Hidden until this time
    pub publish_on: DateTime<Utc>,
    /// Markdown
    pub body: String,
}

impl BlogPost {
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.publish_on <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EmailOrder {
    pub id: i32,
    pub post_id: i32,
    pub audience: EmailAudience,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Email order joined with its post, as read by the sending job
#[derive(Debug, Clone)]
pub struct PendingEmailOrder {
    pub order: EmailOrder,
    pub post: BlogPost,
}

impl PendingEmailOrder {
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        !self.order.email_sent && self.post.is_published_at(now)
    }
}

#[derive(Debug, Deserialize, Validate, IntoParams, ToSchema)]
pub struct BlogQuery {
    #[validate(range(min = 1, max = 1_000_000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBlogPost {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub slug_title: Option<String>,
    #[validate(length(max = 300, message = "Short description is at most 300 characters"))]
    pub short_description: String,
    #[validate(length(min = 1, max = 200, message = "Author is required"))]
    pub author: String,
    /// Defaults to now
    pub publish_on: Option<DateTime<Utc>>,
    pub body: Option<String>,
    /// Queue an email of this post to the given audience
    pub email_audience: Option<EmailAudience>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateBlogPost {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug_title: Option<String>,
    #[validate(length(max = 300))]
    pub short_description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub author: Option<String>,
    pub publish_on: Option<DateTime<Utc>>,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmailOrder {
    pub audience: EmailAudience,
}
