//! Tag endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::tag::{SetTagParents, TagRefreshReport, TagWithParents},
    AppState,
};

use super::AuthenticatedUser;

/// List tags with their parents
#[utoipa::path(
    get,
    path = "/tags",
    tag = "tags",
    responses(
        (status = 200, description = "All tags", body = Vec<TagWithParents>)
    )
)]
pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<TagWithParents>>> {
    let tags = state.services.library.list_tags().await?;
    Ok(Json(tags))
}

/// Replace a tag's parents and refresh every item's computed tags
#[utoipa::path(
    put,
    path = "/tags/{id}/parents",
    tag = "tags",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Tag ID")),
    request_body = SetTagParents,
    responses(
        (status = 200, description = "Parents saved", body = TagWithParents),
        (status = 404, description = "Tag not found")
    )
)]
pub async fn set_tag_parents(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<SetTagParents>,
) -> AppResult<Json<TagWithParents>> {
    claims.require_librarian()?;

    let tag = state.services.library.set_tag_parents(id, &data.parents).await?;
    Ok(Json(tag))
}

/// Recompute computed tags for every item
#[utoipa::path(
    post,
    path = "/tags/refresh",
    tag = "tags",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Computed tags refreshed", body = TagRefreshReport),
        (status = 403, description = "Librarian access required")
    )
)]
pub async fn refresh_tags(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<TagRefreshReport>> {
    claims.require_librarian()?;

    let report = state.services.library.refresh_all_computed_tags().await?;
    tracing::info!(items = report.items_refreshed, by = %claims.sub, "Computed tags refreshed");
    Ok(Json(report))
}
