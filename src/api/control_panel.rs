//! Control panel endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::rank::{AssignRankRequest, CommitteeTransferRequest, ExpireRankRequest, TransferPlan},
    services::control_panel::{BulkRankResult, ControlPanelOperation},
    AppState,
};

use super::{AffectedResponse, AuthenticatedUser};

/// Operations available to the caller
#[utoipa::path(
    get,
    path = "/control-panel",
    tag = "control_panel",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Available operations", body = Vec<ControlPanelOperation>),
        (status = 403, description = "Committee access required")
    )
)]
pub async fn list_operations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ControlPanelOperation>>> {
    claims.require_committee()?;
    Ok(Json(state.services.control_panel.operations(&claims)))
}

/// Expire the gatekeeper rank of everyone off the committee
#[utoipa::path(
    post,
    path = "/control-panel/purge-gatekeepers",
    tag = "control_panel",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Gatekeeper ranks expired", body = AffectedResponse),
        (status = 403, description = "Executive access required")
    )
)]
pub async fn purge_gatekeepers(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AffectedResponse>> {
    claims.require_executive()?;

    let affected = state.services.control_panel.purge_gatekeepers().await?;
    Ok(Json(AffectedResponse { affected }))
}

/// Mark every membership expired
#[utoipa::path(
    post,
    path = "/control-panel/expire-memberships",
    tag = "control_panel",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Memberships expired", body = AffectedResponse),
        (status = 403, description = "Executive access required")
    )
)]
pub async fn expire_memberships(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AffectedResponse>> {
    claims.require_executive()?;

    let affected = state.services.control_panel.expire_memberships().await?;
    Ok(Json(AffectedResponse { affected }))
}

/// Hand committee positions to new holders
#[utoipa::path(
    post,
    path = "/control-panel/committee-transfer",
    tag = "control_panel",
    security(("bearer_auth" = [])),
    request_body = CommitteeTransferRequest,
    responses(
        (status = 200, description = "Applied changes", body = TransferPlan),
        (status = 400, description = "A rank is not a committee position"),
        (status = 403, description = "Executive access required")
    )
)]
pub async fn committee_transfer(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CommitteeTransferRequest>,
) -> AppResult<Json<TransferPlan>> {
    claims.require_executive()?;

    let plan = state.services.control_panel.committee_transfer(&data.positions).await?;
    Ok(Json(plan))
}

/// Give a rank to several members
#[utoipa::path(
    post,
    path = "/control-panel/ranks/assign",
    tag = "control_panel",
    security(("bearer_auth" = [])),
    request_body = AssignRankRequest,
    responses(
        (status = 200, description = "Members given the rank", body = BulkRankResult),
        (status = 403, description = "Committee access required; executive for committee positions")
    )
)]
pub async fn assign_rank(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<AssignRankRequest>,
) -> AppResult<Json<BulkRankResult>> {
    data.validate()?;
    let result = state.services.control_panel.assign_rank(&claims, &data).await?;
    Ok(Json(result))
}

/// Expire a rank for several members
#[utoipa::path(
    post,
    path = "/control-panel/ranks/expire",
    tag = "control_panel",
    security(("bearer_auth" = [])),
    request_body = ExpireRankRequest,
    responses(
        (status = 200, description = "Rank expired", body = BulkRankResult),
        (status = 403, description = "Committee access required; executive for committee positions")
    )
)]
pub async fn expire_rank(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<ExpireRankRequest>,
) -> AppResult<Json<BulkRankResult>> {
    data.validate()?;
    let result = state.services.control_panel.expire_rank(&claims, &data).await?;
    Ok(Json(result))
}
