//! Blog posts and their email orders

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        blog::{BlogPost, CreateBlogPost, EmailOrder, UpdateBlogPost},
        enums::EmailAudience,
    },
    repository::Repository,
    slug,
};

pub const POSTS_PER_PAGE: i64 = 10;

#[derive(Clone)]
pub struct BlogService {
    repository: Repository,
}

impl BlogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// A page of posts; drafts and scheduled posts only for committee
    pub async fn list(&self, page: i64, committee: bool) -> AppResult<(Vec<BlogPost>, i64)> {
        self.repository
            .blog
            .list(committee, Utc::now(), page, POSTS_PER_PAGE)
            .await
    }

    pub async fn get_by_id(&self, id: i32, committee: bool) -> AppResult<BlogPost> {
        let post = self.repository.blog.get_by_id(id).await?;
        visible(post, committee)
    }

    pub async fn get_by_slug(&self, slug: &str, committee: bool) -> AppResult<BlogPost> {
        let post = self.repository.blog.get_by_slug(slug).await?;
        visible(post, committee)
    }

    async fn unique_slug(&self, source: &str, exclude_id: Option<i32>) -> AppResult<String> {
        let mut base = slug::slugify(source);
        if base.is_empty() {
            base = "post".to_string();
        }
        let mut attempt = 1;
        loop {
            let candidate = slug::candidate(&base, attempt);
            if !self.repository.blog.slug_exists(&candidate, exclude_id).await? {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    /// Create a post, queueing an email order when an audience is given
    pub async fn create(&self, data: &CreateBlogPost) -> AppResult<(BlogPost, Option<EmailOrder>)> {
        let slug = self
            .unique_slug(data.slug_title.as_deref().unwrap_or(&data.title), None)
            .await?;
        let publish_on = data.publish_on.unwrap_or_else(Utc::now);
        let post = self.repository.blog.create(data, &slug, publish_on).await?;

        let order = match data.email_audience {
            Some(audience) => Some(self.repository.blog.create_email_order(post.id, audience).await?),
            None => None,
        };

        tracing::info!(post_id = post.id, slug = %post.slug_title, emailed = order.is_some(), "Blog post created");
        Ok((post, order))
    }

    pub async fn update(&self, id: i32, data: &UpdateBlogPost) -> AppResult<BlogPost> {
        match data.slug_title {
            Some(ref requested) => {
                let slug = slug::slugify(requested);
                if slug.is_empty() {
                    return Err(AppError::Validation(
                        "slug_title: must contain letters or digits".to_string(),
                    ));
                }
                if self.repository.blog.slug_exists(&slug, Some(id)).await? {
                    return Err(AppError::Conflict("A post with this slug already exists".to_string()));
                }
                let normalized = UpdateBlogPost {
                    slug_title: Some(slug),
                    ..data.clone()
                };
                self.repository.blog.update(id, &normalized).await
            }
            None => self.repository.blog.update(id, data).await,
        }
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.blog.delete(id).await?;
        tracing::info!(post_id = id, "Blog post deleted");
        Ok(())
    }

    pub async fn create_email_order(&self, post_id: i32, audience: EmailAudience) -> AppResult<EmailOrder> {
        self.repository.blog.get_by_id(post_id).await?;
        let order = self.repository.blog.create_email_order(post_id, audience).await?;
        tracing::info!(post_id, order_id = order.id, audience = %audience, "Email order created");
        Ok(order)
    }

    pub async fn email_orders(&self, post_id: i32) -> AppResult<Vec<EmailOrder>> {
        self.repository.blog.get_by_id(post_id).await?;
        self.repository.blog.email_orders_for_post(post_id).await
    }
}

fn visible(post: BlogPost, committee: bool) -> AppResult<BlogPost> {
    if committee || post.is_published_at(Utc::now()) {
        Ok(post)
    } else {
        Err(AppError::NotFound(format!("Blog post with id {} not found", post.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn post(offset_hours: i64) -> BlogPost {
        BlogPost {
            id: 3,
            title: "AGM".into(),
            slug_title: "agm".into(),
            short_description: String::new(),
            author: "Secretary".into(),
            publish_on: Utc::now() + Duration::hours(offset_hours),
            body: String::new(),
        }
    }

    #[test]
    fn test_scheduled_post_hidden_from_public() {
        assert!(matches!(visible(post(2), false), Err(AppError::NotFound(_))));
        assert!(visible(post(2), true).is_ok());
        assert!(visible(post(-2), false).is_ok());
    }
}
