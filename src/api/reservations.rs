//! Reservation endpoints

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
        enums::ApprovalStatus,
        reservation::{ActivateReservation, CreateReservation, Reservation, ReservationDecision, ReservationDetails},
    },
    AppState,
};

use super::{AuthenticatedUser, MaybeAuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReservationListQuery {
    pub status: Option<ApprovalStatus>,
}

/// Reserve items for a date range; signed-in members make internal reservations
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation submitted", body = ReservationDetails),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn submit_reservation(
    State(state): State<AppState>,
    MaybeAuthenticatedUser(claims): MaybeAuthenticatedUser,
    Json(data): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<ReservationDetails>)> {
    data.validate()?;

    let reservation = state
        .services
        .reservations
        .submit(&data, claims.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// List reservations, optionally by status
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationListQuery),
    responses(
        (status = 200, description = "Reservations", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ReservationListQuery>,
) -> AppResult<Json<Vec<Reservation>>> {
    claims.require_gatekeeper()?;

    let reservations = state.services.reservations.list(query.status).await?;
    Ok(Json(reservations))
}

#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation details", body = ReservationDetails),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    claims.require_gatekeeper()?;

    let reservation = state.services.reservations.get(id).await?;
    Ok(Json(reservation))
}

/// Approve a pending reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/approve",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = ReservationDecision,
    responses(
        (status = 200, description = "Reservation approved", body = ReservationDetails),
        (status = 422, description = "Not pending, or items already committed")
    )
)]
pub async fn approve_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ReservationDecision>,
) -> AppResult<Json<ReservationDetails>> {
    claims.require_librarian()?;

    let reservation = state
        .services
        .reservations
        .approve(id, data.librarian_comments.as_deref())
        .await?;
    Ok(Json(reservation))
}

/// Deny a pending reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/deny",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = ReservationDecision,
    responses(
        (status = 200, description = "Reservation denied", body = ReservationDetails),
        (status = 422, description = "Not pending")
    )
)]
pub async fn deny_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ReservationDecision>,
) -> AppResult<Json<ReservationDetails>> {
    claims.require_librarian()?;

    let reservation = state
        .services
        .reservations
        .deny(id, data.librarian_comments.as_deref())
        .await?;
    Ok(Json(reservation))
}

/// Link the borrow records made when the reserved items went out
#[utoipa::path(
    post,
    path = "/reservations/{id}/activate",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = ActivateReservation,
    responses(
        (status = 200, description = "Borrow records linked", body = ReservationDetails),
        (status = 422, description = "Reservation not approved")
    )
)]
pub async fn activate_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ActivateReservation>,
) -> AppResult<Json<ReservationDetails>> {
    claims.require_gatekeeper()?;

    let reservation = state
        .services
        .reservations
        .activate(id, &data.borrow_record_ids)
        .await?;
    Ok(Json(reservation))
}

/// Close an approved reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/complete",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation completed", body = ReservationDetails),
        (status = 422, description = "Reservation not approved")
    )
)]
pub async fn complete_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    claims.require_librarian()?;

    let reservation = state.services.reservations.complete(id).await?;
    Ok(Json(reservation))
}
