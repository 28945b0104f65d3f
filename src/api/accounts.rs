//! Account endpoints: signup, activation, login and passwords

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::account::{
        AccountInfo, LoginRequest, PasswordChangeRequest, PasswordResetConfirm, PasswordResetRequest,
        SignupRequest, TokenRequest,
    },
    AppState,
};

use super::{AuthenticatedUser, MessageResponse};

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token
    pub token: String,
    pub token_type: String,
    pub account: AccountInfo,
}

/// Request an account for a gatekeeper
#[utoipa::path(
    post,
    path = "/account/signup",
    tag = "account",
    request_body = SignupRequest,
    responses(
        (status = 202, description = "If the details match a gatekeeper, an activation email is on its way", body = MessageResponse),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    request.validate()?;
    state.services.accounts.signup(&request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If these details belong to a gatekeeper, an activation email has been sent",
        )),
    ))
}

/// Activate an account from its emailed link
#[utoipa::path(
    post,
    path = "/account/activate",
    tag = "account",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Account activated", body = MessageResponse),
        (status = 400, description = "Invalid or expired link")
    )
)]
pub async fn activate(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.accounts.activate(&request.token).await?;
    Ok(Json(MessageResponse::new("Account activated")))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/account/login",
    tag = "account",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, account) = state.services.accounts.login(&request).await?;
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        account,
    }))
}

/// Current account
#[utoipa::path(
    get,
    path = "/account/me",
    tag = "account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current account", body = AccountInfo),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AccountInfo>> {
    let info = state.services.accounts.me(&claims).await?;
    Ok(Json(info))
}

/// Change the current account's password
#[utoipa::path(
    post,
    path = "/account/password",
    tag = "account",
    security(("bearer_auth" = [])),
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password is incorrect")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<PasswordChangeRequest>,
) -> AppResult<Json<MessageResponse>> {
    request.validate()?;
    state
        .services
        .accounts
        .change_password(claims.account_id, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

/// Email a password reset link
#[utoipa::path(
    post,
    path = "/account/password-reset",
    tag = "account",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "If the address has an account, a reset email is on its way", body = MessageResponse)
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    request.validate()?;
    state.services.accounts.request_password_reset(&request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If this address has an account, a password reset email has been sent",
        )),
    ))
}

/// Set a new password from a reset link
#[utoipa::path(
    post,
    path = "/account/password-reset/confirm",
    tag = "account",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired link")
    )
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirm>,
) -> AppResult<Json<MessageResponse>> {
    request.validate()?;
    state
        .services
        .accounts
        .confirm_password_reset(&request.token, &request.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset")))
}
