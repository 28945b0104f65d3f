//! Lending endpoints: borrowing, returns and overdue items

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::borrow::{BorrowRecord, BorrowRecordDetails, BorrowRequest, ReturnRequest},
    AppState,
};

use super::AuthenticatedUser;

/// Lend items to a member
#[utoipa::path(
    post,
    path = "/library/borrow",
    tag = "library",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Borrow records created", body = Vec<BorrowRecord>),
        (status = 422, description = "Item not available or membership not valid")
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Vec<BorrowRecord>>)> {
    claims.require_gatekeeper()?;
    request.validate()?;

    let records = state.services.library.borrow(&request, claims.member_id).await?;
    Ok((StatusCode::CREATED, Json(records)))
}

/// Mark borrow records returned
#[utoipa::path(
    post,
    path = "/library/return",
    tag = "library",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Records returned", body = Vec<BorrowRecord>),
        (status = 422, description = "A record was already returned")
    )
)]
pub async fn return_items(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<Vec<BorrowRecord>>> {
    claims.require_gatekeeper()?;
    request.validate()?;

    let records = state
        .services
        .library
        .return_items(&request.record_ids, claims.member_id)
        .await?;
    Ok(Json(records))
}

/// Confirm a returned item is back on the shelf
#[utoipa::path(
    post,
    path = "/library/borrows/{id}/verify",
    tag = "library",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Return verified", body = BorrowRecord),
        (status = 422, description = "Record not returned yet")
    )
)]
pub async fn verify_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    claims.require_librarian()?;

    let record = state.services.library.verify_return(id).await?;
    Ok(Json(record))
}

/// Unreturned records past their due date
#[utoipa::path(
    get,
    path = "/library/overdue",
    tag = "library",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue records", body = Vec<BorrowRecordDetails>)
    )
)]
pub async fn overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    claims.require_gatekeeper()?;

    let records = state.services.library.overdue().await?;
    Ok(Json(records))
}

/// A member's borrow history, newest first
#[utoipa::path(
    get,
    path = "/members/{id}/borrows",
    tag = "library",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Borrow records", body = Vec<BorrowRecordDetails>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn member_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    claims.require_gatekeeper()?;

    let records = state.services.library.member_records(id).await?;
    Ok(Json(records))
}
