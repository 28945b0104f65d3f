//! Blog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::blog::{BlogPost, BlogQuery, CreateBlogPost, CreateEmailOrder, EmailOrder, UpdateBlogPost},
    services::blog::POSTS_PER_PAGE,
    AppState,
};

use super::{AuthenticatedUser, MaybeAuthenticatedUser, PaginatedResponse};

#[derive(Serialize, ToSchema)]
pub struct CreatedPostResponse {
    pub post: BlogPost,
    /// Present when the post was queued for emailing
    pub email_order: Option<EmailOrder>,
}

/// List blog posts, newest first
#[utoipa::path(
    get,
    path = "/blog",
    tag = "blog",
    params(BlogQuery),
    responses(
        (status = 200, description = "A page of posts", body = PaginatedResponse<BlogPost>)
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    caller: MaybeAuthenticatedUser,
    Query(query): Query<BlogQuery>,
) -> AppResult<Json<PaginatedResponse<BlogPost>>> {
    query.validate()?;
    let page = query.page.unwrap_or(1).max(1);
    let (items, total) = state.services.blog.list(page, caller.is_committee()).await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page,
        per_page: POSTS_PER_PAGE,
    }))
}

#[utoipa::path(
    get,
    path = "/blog/{id}",
    tag = "blog",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Blog post", body = BlogPost),
        (status = 404, description = "Post not found or not published yet")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    caller: MaybeAuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BlogPost>> {
    let post = state.services.blog.get_by_id(id, caller.is_committee()).await?;
    Ok(Json(post))
}

#[utoipa::path(
    get,
    path = "/blog/slug/{slug}",
    tag = "blog",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Blog post", body = BlogPost),
        (status = 404, description = "Post not found or not published yet")
    )
)]
pub async fn get_post_by_slug(
    State(state): State<AppState>,
    caller: MaybeAuthenticatedUser,
    Path(slug): Path<String>,
) -> AppResult<Json<BlogPost>> {
    let post = state.services.blog.get_by_slug(&slug, caller.is_committee()).await?;
    Ok(Json(post))
}

/// Write a post, optionally queueing it for email
#[utoipa::path(
    post,
    path = "/blog",
    tag = "blog",
    security(("bearer_auth" = [])),
    request_body = CreateBlogPost,
    responses(
        (status = 201, description = "Post created", body = CreatedPostResponse),
        (status = 403, description = "Committee access required")
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBlogPost>,
) -> AppResult<(StatusCode, Json<CreatedPostResponse>)> {
    claims.require_committee()?;
    data.validate()?;

    let (post, email_order) = state.services.blog.create(&data).await?;
    Ok((StatusCode::CREATED, Json(CreatedPostResponse { post, email_order })))
}

#[utoipa::path(
    put,
    path = "/blog/{id}",
    tag = "blog",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = UpdateBlogPost,
    responses(
        (status = 200, description = "Post updated", body = BlogPost),
        (status = 404, description = "Post not found"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateBlogPost>,
) -> AppResult<Json<BlogPost>> {
    claims.require_committee()?;
    data.validate()?;

    let post = state.services.blog.update(id, &data).await?;
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/blog/{id}",
    tag = "blog",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_committee()?;

    state.services.blog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queue a post for emailing to an audience
#[utoipa::path(
    post,
    path = "/blog/{id}/email-orders",
    tag = "blog",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = CreateEmailOrder,
    responses(
        (status = 201, description = "Email order created", body = EmailOrder),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_email_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CreateEmailOrder>,
) -> AppResult<(StatusCode, Json<EmailOrder>)> {
    claims.require_committee()?;

    let order = state.services.blog.create_email_order(id, data.audience).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/blog/{id}/email-orders",
    tag = "blog",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Email orders of the post", body = Vec<EmailOrder>)
    )
)]
pub async fn list_email_orders(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<EmailOrder>>> {
    claims.require_committee()?;

    let orders = state.services.blog.email_orders(id).await?;
    Ok(Json(orders))
}
