//! Library item endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        enums::ItemType,
        item::{CreateItem, ItemDetails, ItemListEntry, ItemQuery, ItemSummary, UpdateItem},
        tag::SetBaseTags,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

#[derive(Debug, Deserialize, IntoParams)]
pub struct RandomItemQuery {
    /// Restrict the pick to one item type
    pub item_type: Option<ItemType>,
}

/// List items with availability
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(ItemQuery),
    responses(
        (status = 200, description = "List of items", body = PaginatedResponse<ItemListEntry>)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<PaginatedResponse<ItemListEntry>>> {
    query.validate()?;
    let (items, total) = state.services.library.list_items(&query).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(("id" = i32, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item details", body = ItemDetails),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<ItemDetails>> {
    let item = state.services.library.get_item(id).await?;
    Ok(Json(item))
}

/// Get item details by slug
#[utoipa::path(
    get,
    path = "/items/slug/{slug}",
    tag = "items",
    params(("slug" = String, Path, description = "Item slug")),
    responses(
        (status = 200, description = "Item details", body = ItemDetails),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ItemDetails>> {
    let item = state.services.library.get_item_by_slug(&slug).await?;
    Ok(Json(item))
}

/// Create a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    security(("bearer_auth" = [])),
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = ItemDetails),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian access required")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<ItemDetails>)> {
    claims.require_librarian()?;
    data.validate()?;

    let created = state.services.library.create_item(&data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing item
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Item ID")),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = ItemDetails),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateItem>,
) -> AppResult<Json<ItemDetails>> {
    claims.require_librarian()?;
    data.validate()?;

    let updated = state.services.library.update_item(id, &data).await?;
    Ok(Json(updated))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_librarian()?;

    state.services.library.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace an item's base tags
#[utoipa::path(
    put,
    path = "/items/{id}/tags",
    tag = "items",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Item ID")),
    request_body = SetBaseTags,
    responses(
        (status = 200, description = "Tags saved, computed tags refreshed", body = ItemDetails),
        (status = 404, description = "Item not found")
    )
)]
pub async fn set_item_tags(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<SetBaseTags>,
) -> AppResult<Json<ItemDetails>> {
    claims.require_librarian()?;

    let item = state.services.library.set_base_tags(id, &data.tags).await?;
    Ok(Json(item))
}

/// Pick a random item
#[utoipa::path(
    get,
    path = "/items/random",
    tag = "items",
    params(RandomItemQuery),
    responses(
        (status = 200, description = "A random item", body = ItemSummary),
        (status = 404, description = "No items of that type")
    )
)]
pub async fn random_item(
    State(state): State<AppState>,
    Query(query): Query<RandomItemQuery>,
) -> AppResult<Json<ItemSummary>> {
    let item = state.services.library.random_item(query.item_type).await?;
    Ok(Json(item))
}

/// Every item, in short form
#[utoipa::path(
    get,
    path = "/items/all",
    tag = "items",
    responses(
        (status = 200, description = "All items", body = Vec<ItemSummary>)
    )
)]
pub async fn all_items(State(state): State<AppState>) -> AppResult<Json<Vec<ItemSummary>>> {
    let items = state.services.library.all_items().await?;
    Ok(Json(items))
}
