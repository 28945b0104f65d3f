//! Items repository for database operations

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use super::{conflict_on_unique, page_offset};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ItemType,
        item::{Commitment, CreateItem, Item, ItemQuery, LendingState, UpdateItem},
    },
};

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    pub async fn get_by_id(&self, id: i32) -> AppResult<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", slug)))
    }

    pub async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Every item, ordered by name
    pub async fn all(&self) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn all_ids(&self) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT id FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// One random item, optionally of a given type
    pub async fn random(&self, item_type: Option<ItemType>) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            "SELECT * FROM items WHERE ($1::text IS NULL OR item_type = $1) ORDER BY random() LIMIT 1",
        )
        .bind(item_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// Filter by type, computed tag name and name fragment, with pagination
    pub async fn search(&self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 200);
        let offset = page_offset(page, per_page)?;

        let mut conditions = vec!["TRUE".to_string()];
        let mut idx = 1;

        if query.item_type.is_some() {
            conditions.push(format!("i.item_type = ${}", idx));
            idx += 1;
        }
        let tag = query.tag.as_ref().map(|t| t.trim()).filter(|t| !t.is_empty());
        if tag.is_some() {
            conditions.push(format!(
                r#"EXISTS (
                    SELECT 1 FROM item_computed_tags ict JOIN tags t ON t.id = ict.tag_id
                    WHERE ict.item_id = i.id AND lower(t.name) = lower(${}))"#,
                idx
            ));
            idx += 1;
        }
        let name_pattern = query
            .name
            .as_ref()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(|n| format!("%{}%", n));
        if name_pattern.is_some() {
            conditions.push(format!("i.name ILIKE ${}", idx));
            idx += 1;
        }
        let where_clause = conditions.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM items i WHERE {}", where_clause);
        let list_sql = format!(
            "SELECT i.* FROM items i WHERE {} ORDER BY i.name, i.id LIMIT ${} OFFSET ${}",
            where_clause,
            idx,
            idx + 1
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut list_query = sqlx::query_as::<_, Item>(&list_sql);
        if let Some(item_type) = query.item_type {
            count_query = count_query.bind(item_type);
            list_query = list_query.bind(item_type);
        }
        if let Some(tag) = tag {
            count_query = count_query.bind(tag);
            list_query = list_query.bind(tag);
        }
        if let Some(ref pattern) = name_pattern {
            count_query = count_query.bind(pattern);
            list_query = list_query.bind(pattern);
        }

        let total = count_query.fetch_one(&self.pool).await?;
        let items = list_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    pub async fn slug_exists(&self, slug: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE slug = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, data: &CreateItem, slug: &str) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, slug, description, condition, notes, item_type, image_url,
                               is_borrowable, high_value, min_players, max_players, average_play_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(data.name.trim())
        .bind(slug)
        .bind(data.description.as_deref().unwrap_or(""))
        .bind(data.condition.as_deref().unwrap_or(""))
        .bind(data.notes.as_deref().unwrap_or(""))
        .bind(data.item_type)
        .bind(&data.image_url)
        .bind(data.is_borrowable.unwrap_or(true))
        .bind(data.high_value.unwrap_or(false))
        .bind(data.min_players)
        .bind(data.max_players)
        .bind(data.average_play_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "An item with this slug already exists"))
    }

    pub async fn update(&self, id: i32, data: &UpdateItem) -> AppResult<Item> {
        let now = Utc::now();
        let mut sets = vec!["modified_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.slug, "slug");
        add_field!(data.description, "description");
        add_field!(data.condition, "condition");
        add_field!(data.notes, "notes");
        add_field!(data.item_type, "item_type");
        add_field!(data.image_url, "image_url");
        add_field!(data.is_borrowable, "is_borrowable");
        add_field!(data.high_value, "high_value");
        add_field!(data.min_players, "min_players");
        add_field!(data.max_players, "max_players");
        add_field!(data.average_play_time, "average_play_time");

        let query = format!(
            "UPDATE items SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Item>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.slug);
        bind_field!(data.description);
        bind_field!(data.condition);
        bind_field!(data.notes);
        bind_field!(data.item_type);
        bind_field!(data.image_url);
        bind_field!(data.is_borrowable);
        bind_field!(data.high_value);
        bind_field!(data.min_players);
        bind_field!(data.max_players);
        bind_field!(data.average_play_time);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "An item with this slug already exists"))?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Item with id {} not found", id)));
        }
        Ok(())
    }

    // =========================================================================
    // LENDING
    // =========================================================================

    /// Loans, hand-overs and commitments for each of `item_ids`, as seen on `today`
    pub async fn lending_states(&self, item_ids: &[i32], today: NaiveDate) -> AppResult<HashMap<i32, LendingState>> {
        let mut conn = self.pool.acquire().await?;
        lending_states_on(&mut conn, item_ids, today).await
    }
}

/// Lock the rows of `ids` until the surrounding transaction ends.
/// Every write that depends on an item's availability takes these locks first.
pub(crate) async fn lock_items(conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<Item>> {
    let items = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

/// Loans, hand-overs and commitments for each of `item_ids`, as seen on `today`.
/// Items with nothing recorded get an empty state.
pub(crate) async fn lending_states_on(
    conn: &mut PgConnection,
    item_ids: &[i32],
    today: NaiveDate,
) -> AppResult<HashMap<i32, LendingState>> {
    let mut states: HashMap<i32, LendingState> =
        item_ids.iter().map(|id| (*id, LendingState::default())).collect();
    if item_ids.is_empty() {
        return Ok(states);
    }

    let open_loans = sqlx::query_as::<_, (i32, NaiveDate)>(
        "SELECT item_id, due_date FROM borrow_records WHERE item_id = ANY($1) AND date_returned IS NULL",
    )
    .bind(item_ids)
    .fetch_all(&mut *conn)
    .await?;
    for (item_id, due_date) in open_loans {
        states.entry(item_id).or_default().open_loans.push(due_date);
    }

    let external_out = sqlx::query_as::<_, (i32, Option<NaiveDate>)>(
        r#"
        SELECT r.item_id, f.due_date
        FROM external_borrowing_item_records r
        JOIN external_borrowing_forms f ON f.id = r.form_id
        WHERE r.item_id = ANY($1)
          AND r.date_borrowed IS NOT NULL AND r.date_borrowed <= $2
          AND r.date_returned IS NULL
        "#,
    )
    .bind(item_ids)
    .bind(today)
    .fetch_all(&mut *conn)
    .await?;
    for (item_id, due_date) in external_out {
        states.entry(item_id).or_default().external_out.push(due_date);
    }

    let commitments = sqlx::query_as::<_, (i32, NaiveDate, NaiveDate)>(
        r#"
        SELECT r.item_id, f.requested_borrow_date, f.due_date
        FROM external_borrowing_item_records r
        JOIN external_borrowing_forms f ON f.id = r.form_id
        WHERE r.item_id = ANY($1) AND f.form_status = 'A'
          AND f.due_date IS NOT NULL AND f.due_date >= $2
          AND r.date_returned IS NULL
        UNION ALL
        SELECT ri.item_id, res.date_to_borrow, res.date_to_return
        FROM reservation_items ri
        JOIN reservations res ON res.id = ri.reservation_id
        WHERE ri.item_id = ANY($1) AND res.approval_status = 'A'
          AND res.date_to_return >= $2
        "#,
    )
    .bind(item_ids)
    .bind(today)
    .fetch_all(&mut *conn)
    .await?;
    for (item_id, start, end) in commitments {
        states
            .entry(item_id)
            .or_default()
            .commitments
            .push(Commitment { start, end });
    }

    Ok(states)
}
