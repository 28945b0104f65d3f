//! Tags, tag hierarchy and item tag links

use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::tag::{Tag, TagEdge, TagWithParents},
};

#[derive(Clone)]
pub struct TagsRepository {
    pool: Pool<Postgres>,
}

impl TagsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag with id {} not found", id)))
    }

    pub async fn list(&self) -> AppResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    /// All tags with their direct parents
    pub async fn list_with_parents(&self) -> AppResult<Vec<TagWithParents>> {
        let tags = self.list().await?;
        let by_id: HashMap<i32, Tag> = tags.iter().map(|t| (t.id, t.clone())).collect();
        let edges = self.edges().await?;

        let mut parents: HashMap<i32, Vec<Tag>> = HashMap::new();
        for edge in edges {
            if let Some(parent) = by_id.get(&edge.parent_id) {
                parents.entry(edge.tag_id).or_default().push(parent.clone());
            }
        }

        Ok(tags
            .into_iter()
            .map(|t| TagWithParents {
                parents: parents.remove(&t.id).unwrap_or_default(),
                id: t.id,
                name: t.name,
            })
            .collect())
    }

    /// Look up tags by name, creating the missing ones
    pub async fn get_or_create(&self, names: &[String]) -> AppResult<Vec<Tag>> {
        let mut names: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query(
            "INSERT INTO tags (name) SELECT UNNEST($1::text[]) ON CONFLICT (name) DO NOTHING",
        )
        .bind(&names)
        .execute(&self.pool)
        .await?;

        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ANY($1) ORDER BY name")
            .bind(&names)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn edges(&self) -> AppResult<Vec<TagEdge>> {
        let edges = sqlx::query_as::<_, TagEdge>("SELECT tag_id, parent_id FROM tag_parents")
            .fetch_all(&self.pool)
            .await?;
        Ok(edges)
    }

    /// Replace the direct parents of a tag
    pub async fn set_parents(&self, tag_id: i32, parent_ids: &[i32]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tag_parents WHERE tag_id = $1")
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO tag_parents (tag_id, parent_id)
            SELECT $1, p FROM UNNEST($2::int[]) AS p
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(tag_id)
        .bind(parent_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn base_tags(&self, item_id: i32) -> AppResult<Vec<Tag>> {
        self.item_tags("item_base_tags", item_id).await
    }

    pub async fn computed_tags(&self, item_id: i32) -> AppResult<Vec<Tag>> {
        self.item_tags("item_computed_tags", item_id).await
    }

    async fn item_tags(&self, table: &str, item_id: i32) -> AppResult<Vec<Tag>> {
        let sql = format!(
            "SELECT t.id, t.name FROM {} it JOIN tags t ON t.id = it.tag_id WHERE it.item_id = $1 ORDER BY t.name",
            table
        );
        let tags = sqlx::query_as::<_, Tag>(&sql)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn set_base_tags(&self, item_id: i32, tag_ids: &[i32]) -> AppResult<()> {
        self.replace_item_tags("item_base_tags", item_id, tag_ids).await
    }

    pub async fn set_computed_tags(&self, item_id: i32, tag_ids: &[i32]) -> AppResult<()> {
        self.replace_item_tags("item_computed_tags", item_id, tag_ids).await
    }

    async fn replace_item_tags(&self, table: &str, item_id: i32, tag_ids: &[i32]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {} WHERE item_id = $1", table))
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "INSERT INTO {} (item_id, tag_id) SELECT $1, t FROM UNNEST($2::int[]) AS t ON CONFLICT DO NOTHING",
            table
        ))
        .bind(item_id)
        .bind(tag_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
