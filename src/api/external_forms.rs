//! External borrowing form endpoints

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
        enums::FormStatus,
        external::{
            ApproveExternalForm, CreateExternalForm, DenyRequest, ExternalBorrowingForm, ExternalFormDetails,
            ExternalItemsAction,
        },
    },
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct FormListQuery {
    pub status: Option<FormStatus>,
}

/// Submit a request to borrow items for an outside event
#[utoipa::path(
    post,
    path = "/external-forms",
    tag = "external_forms",
    request_body = CreateExternalForm,
    responses(
        (status = 201, description = "Form submitted", body = ExternalFormDetails),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn submit_form(
    State(state): State<AppState>,
    Json(data): Json<CreateExternalForm>,
) -> AppResult<(StatusCode, Json<ExternalFormDetails>)> {
    data.validate()?;

    let form = state.services.external_forms.submit(&data).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// List forms, optionally by status
#[utoipa::path(
    get,
    path = "/external-forms",
    tag = "external_forms",
    security(("bearer_auth" = [])),
    params(FormListQuery),
    responses(
        (status = 200, description = "Forms", body = Vec<ExternalBorrowingForm>)
    )
)]
pub async fn list_forms(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<FormListQuery>,
) -> AppResult<Json<Vec<ExternalBorrowingForm>>> {
    claims.require_gatekeeper()?;

    let forms = state.services.external_forms.list(query.status).await?;
    Ok(Json(forms))
}

/// Get a form with its item records
#[utoipa::path(
    get,
    path = "/external-forms/{id}",
    tag = "external_forms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Form ID")),
    responses(
        (status = 200, description = "Form details", body = ExternalFormDetails),
        (status = 404, description = "Form not found")
    )
)]
pub async fn get_form(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ExternalFormDetails>> {
    claims.require_gatekeeper()?;

    let form = state.services.external_forms.get(id).await?;
    Ok(Json(form))
}

/// Approve a form and set its due date
#[utoipa::path(
    post,
    path = "/external-forms/{id}/approve",
    tag = "external_forms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Form ID")),
    request_body = ApproveExternalForm,
    responses(
        (status = 200, description = "Form approved", body = ExternalFormDetails),
        (status = 422, description = "Form not awaiting approval, or items not free")
    )
)]
pub async fn approve_form(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ApproveExternalForm>,
) -> AppResult<Json<ExternalFormDetails>> {
    claims.require_librarian()?;

    let form = state.services.external_forms.approve(id, &data).await?;
    Ok(Json(form))
}

/// Deny a form
#[utoipa::path(
    post,
    path = "/external-forms/{id}/deny",
    tag = "external_forms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Form ID")),
    request_body = DenyRequest,
    responses(
        (status = 200, description = "Form denied", body = ExternalFormDetails),
        (status = 422, description = "Form not awaiting approval")
    )
)]
pub async fn deny_form(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<DenyRequest>,
) -> AppResult<Json<ExternalFormDetails>> {
    claims.require_librarian()?;

    let form = state
        .services
        .external_forms
        .deny(id, data.librarian_comments.as_deref())
        .await?;
    Ok(Json(form))
}

/// Hand items of an approved form over to the applicant
#[utoipa::path(
    post,
    path = "/external-forms/{id}/borrowed",
    tag = "external_forms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Form ID")),
    request_body = ExternalItemsAction,
    responses(
        (status = 200, description = "Items marked borrowed", body = ExternalFormDetails),
        (status = 422, description = "Form not approved")
    )
)]
pub async fn mark_borrowed(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ExternalItemsAction>,
) -> AppResult<Json<ExternalFormDetails>> {
    claims.require_gatekeeper()?;
    data.validate()?;

    let form = state
        .services
        .external_forms
        .mark_borrowed(id, &data, claims.member_id)
        .await?;
    Ok(Json(form))
}

/// Take items of an approved form back
#[utoipa::path(
    post,
    path = "/external-forms/{id}/returned",
    tag = "external_forms",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Form ID")),
    request_body = ExternalItemsAction,
    responses(
        (status = 200, description = "Items marked returned", body = ExternalFormDetails),
        (status = 422, description = "Form not approved, or items not out")
    )
)]
pub async fn mark_returned(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ExternalItemsAction>,
) -> AppResult<Json<ExternalFormDetails>> {
    claims.require_gatekeeper()?;
    data.validate()?;

    let form = state
        .services
        .external_forms
        .mark_returned(id, &data, claims.member_id)
        .await?;
    Ok(Json(form))
}
