//! Blog posts and email orders repository

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{conflict_on_unique, page_offset};
use crate::{
    error::{AppError, AppResult},
    models::{
        blog::{BlogPost, CreateBlogPost, EmailOrder, PendingEmailOrder, UpdateBlogPost},
        enums::EmailAudience,
    },
};

#[derive(Clone)]
pub struct BlogRepository {
    pool: Pool<Postgres>,
}

impl BlogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Posts newest first. Unpublished posts only when `include_unpublished`.
    pub async fn list(
        &self,
        include_unpublished: bool,
        now: DateTime<Utc>,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<BlogPost>, i64)> {
        let offset = page_offset(page, per_page)?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM blog_posts WHERE $1 OR publish_on <= $2",
        )
        .bind(include_unpublished)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let posts = sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT * FROM blog_posts
            WHERE $1 OR publish_on <= $2
            ORDER BY publish_on DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(include_unpublished)
        .bind(now)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((posts, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<BlogPost> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blog post with id {} not found", id)))
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<BlogPost> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE slug_title = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blog post {} not found", slug)))
    }

    pub async fn slug_exists(&self, slug: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM blog_posts WHERE slug_title = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, data: &CreateBlogPost, slug: &str, publish_on: DateTime<Utc>) -> AppResult<BlogPost> {
        sqlx::query_as::<_, BlogPost>(
            r#"
            INSERT INTO blog_posts (title, slug_title, short_description, author, publish_on, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.title.trim())
        .bind(slug)
        .bind(&data.short_description)
        .bind(data.author.trim())
        .bind(publish_on)
        .bind(data.body.as_deref().unwrap_or(""))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "A post with this slug already exists"))
    }

    pub async fn update(&self, id: i32, data: &UpdateBlogPost) -> AppResult<BlogPost> {
        let mut sets: Vec<String> = Vec::new();
        let mut idx = 1;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.title, "title");
        add_field!(data.slug_title, "slug_title");
        add_field!(data.short_description, "short_description");
        add_field!(data.author, "author");
        add_field!(data.publish_on, "publish_on");
        add_field!(data.body, "body");

        if sets.is_empty() {
            return self.get_by_id(id).await;
        }

        let query = format!(
            "UPDATE blog_posts SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, BlogPost>(&query);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.title);
        bind_field!(data.slug_title);
        bind_field!(data.short_description);
        bind_field!(data.author);
        bind_field!(data.publish_on);
        bind_field!(data.body);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "A post with this slug already exists"))?
            .ok_or_else(|| AppError::NotFound(format!("Blog post with id {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Blog post with id {} not found", id)));
        }
        Ok(())
    }

    // =========================================================================
    // EMAIL ORDERS
    // =========================================================================

    pub async fn create_email_order(&self, post_id: i32, audience: EmailAudience) -> AppResult<EmailOrder> {
        let order = sqlx::query_as::<_, EmailOrder>(
            "INSERT INTO email_orders (post_id, audience) VALUES ($1, $2) RETURNING *",
        )
        .bind(post_id)
        .bind(audience)
        .fetch_one(&self.pool)
        .await?;
        Ok(order)
    }

    pub async fn email_orders_for_post(&self, post_id: i32) -> AppResult<Vec<EmailOrder>> {
        let orders = sqlx::query_as::<_, EmailOrder>(
            "SELECT * FROM email_orders WHERE post_id = $1 ORDER BY id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Unsent orders whose post is published at `now`
    pub async fn pending_orders(&self, now: DateTime<Utc>) -> AppResult<Vec<PendingEmailOrder>> {
        let orders = sqlx::query_as::<_, EmailOrder>(
            r#"
            SELECT o.* FROM email_orders o
            JOIN blog_posts p ON p.id = o.post_id
            WHERE NOT o.email_sent AND p.publish_on <= $1
            ORDER BY o.id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i32> = orders.iter().map(|o| o.post_id).collect();
        let posts: HashMap<i32, BlogPost> = sqlx::query_as::<_, BlogPost>(
            "SELECT * FROM blog_posts WHERE id = ANY($1)",
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

        Ok(orders
            .into_iter()
            .filter_map(|order| {
                let post = posts.get(&order.post_id)?.clone();
                Some(PendingEmailOrder { order, post })
            })
            .collect())
    }

    pub async fn mark_order_sent(&self, id: i32, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE email_orders SET email_sent = TRUE, sent_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
