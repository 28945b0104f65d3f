//! Member endpoints

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
    models::member::{
        CreateMember, CreateMembership, EmailPreferencesRequest, Member, MemberProfile, MemberQuery, MemberShort,
        Membership, UpdateEmailPreferences, UpdateMember,
    },
    AppState,
};

use super::{AuthenticatedUser, MessageResponse, PaginatedResponse};

#[derive(Serialize, ToSchema)]
pub struct NewMemberResponse {
    pub member: Member,
    pub membership: Membership,
}

/// Search members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    params(MemberQuery),
    responses(
        (status = 200, description = "Matching members", body = PaginatedResponse<MemberShort>),
        (status = 403, description = "Gatekeeper access required")
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<PaginatedResponse<MemberShort>>> {
    claims.require_gatekeeper()?;
    query.validate()?;

    let (items, total) = state.services.members.search(&query, &claims).await?;
    Ok(Json(PaginatedResponse {
        items,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(25),
    }))
}

/// Sign up a new member with their first membership
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = NewMemberResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email address already in use")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<NewMemberResponse>)> {
    claims.require_gatekeeper()?;
    data.validate()?;

    let (member, membership) = state.services.members.create(&data, claims.member_id).await?;
    Ok((StatusCode::CREATED, Json(NewMemberResponse { member, membership })))
}

/// Member profile with memberships, ranks and borrowed items
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member profile", body = MemberProfile),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MemberProfile>> {
    claims.require_gatekeeper()?;

    let profile = state.services.members.profile(id).await?;
    Ok(Json(profile))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 403, description = "Committee access required"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    claims.require_committee()?;
    data.validate()?;

    let member = state.services.members.update(id, &data).await?;
    Ok(Json(member))
}

/// Sell a new membership to an existing member
#[utoipa::path(
    post,
    path = "/members/{id}/memberships",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    request_body = CreateMembership,
    responses(
        (status = 201, description = "Membership added", body = Membership),
        (status = 422, description = "Member already has a valid membership")
    )
)]
pub async fn renew_membership(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CreateMembership>,
) -> AppResult<(StatusCode, Json<Membership>)> {
    claims.require_gatekeeper()?;
    data.validate()?;

    let membership = state.services.members.renew(id, &data, claims.member_id).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

/// Email a link for changing email preferences
#[utoipa::path(
    post,
    path = "/members/email-preferences/request",
    tag = "members",
    request_body = EmailPreferencesRequest,
    responses(
        (status = 202, description = "If the address belongs to a member, a link is on its way", body = MessageResponse)
    )
)]
pub async fn request_email_preferences(
    State(state): State<AppState>,
    Json(request): Json<EmailPreferencesRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    request.validate()?;
    state.services.members.request_email_preferences(&request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If this address belongs to a member, an email preferences link has been sent",
        )),
    ))
}

/// Apply email preferences from an emailed link
#[utoipa::path(
    put,
    path = "/members/email-preferences",
    tag = "members",
    request_body = UpdateEmailPreferences,
    responses(
        (status = 200, description = "Preferences saved", body = MessageResponse),
        (status = 400, description = "Invalid or expired link")
    )
)]
pub async fn update_email_preferences(
    State(state): State<AppState>,
    Json(request): Json<UpdateEmailPreferences>,
) -> AppResult<Json<MessageResponse>> {
    let member = state
        .services
        .members
        .update_email_preferences(&request.token, request.receive_emails)
        .await?;
    let message = if member.receive_emails {
        "You will receive club emails"
    } else {
        "You will no longer receive club emails"
    };
    Ok(Json(MessageResponse::new(message)))
}
