//! API handlers for Phylactery REST endpoints

pub mod accounts;
pub mod blog;
pub mod control_panel;
pub mod external_forms;
pub mod health;
pub mod items;
pub mod library;
pub mod members;
pub mod openapi;
pub mod reservations;
pub mod tags;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppError, models::account::SessionClaims, AppState};

/// Extractor for an authenticated session from the JWT bearer token,
/// with the caller's ranks as they stand now
pub struct AuthenticatedUser(pub SessionClaims);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Authentication("Invalid authorization header format".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.services.accounts.authenticate(token).await?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Session if one was presented; public endpoints that show more to staff use this
pub struct MaybeAuthenticatedUser(pub Option<SessionClaims>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeAuthenticatedUser(None)),
            Some(token) => {
                let claims = state.services.accounts.authenticate(token).await?;
                Ok(MaybeAuthenticatedUser(Some(claims)))
            }
        }
    }
}

impl MaybeAuthenticatedUser {
    pub fn is_committee(&self) -> bool {
        self.0.as_ref().map(|c| c.is_committee()).unwrap_or(false)
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Page contents
    pub items: Vec<T>,
    /// Total number of matching rows
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Rows per page
    pub per_page: i64,
}

/// Count of rows touched by a bulk operation
#[derive(Serialize, ToSchema)]
pub struct AffectedResponse {
    pub affected: u64,
}

/// Plain acknowledgement
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
