//! Login accounts (gatekeepers and above) and session claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::RankName;
use super::rank::{ActiveRanks, Tier};
use crate::error::AppError;

/// Account record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Account {
    pub id: i32,
    pub member_id: i32,
    pub username: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Account signup request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirm {
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// JWT claims for an authenticated session.
///
/// The token only identifies the account; `ranks` is never encoded and is
/// filled in from the member's current assignments on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub account_id: i32,
    pub member_id: i32,
    #[serde(skip)]
    pub ranks: Vec<RankName>,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Attach the ranks the member holds now. Sessions of deactivated
    /// accounts, excluded members and lapsed gatekeepers are refused.
    pub fn with_current_ranks(mut self, account: &Account, ranks: ActiveRanks) -> Result<Self, AppError> {
        if account.id != self.account_id
            || account.member_id != self.member_id
            || !account.is_active
            || ranks.is_excluded()
            || !ranks.is_gatekeeper()
        {
            return Err(AppError::Authentication("Session is no longer valid".to_string()));
        }
        self.ranks = ranks.0;
        Ok(self)
    }

    pub fn ranks(&self) -> ActiveRanks {
        ActiveRanks(self.ranks.clone())
    }

    pub fn tier(&self) -> Tier {
        self.ranks().tier()
    }

    pub fn is_committee(&self) -> bool {
        self.tier() >= Tier::Committee
    }

    fn require_tier(&self, tier: Tier, what: &str) -> Result<(), AppError> {
        if self.tier() >= tier {
            Ok(())
        } else {
            Err(AppError::Authorization(format!("{} access required", what)))
        }
    }

    pub fn require_gatekeeper(&self) -> Result<(), AppError> {
        self.require_tier(Tier::Gatekeeper, "Gatekeeper")
    }

    pub fn require_committee(&self) -> Result<(), AppError> {
        self.require_tier(Tier::Committee, "Committee")
    }

    pub fn require_executive(&self) -> Result<(), AppError> {
        self.require_tier(Tier::Executive, "Executive")
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.ranks().is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian access required".to_string()))
        }
    }
}

/// Current account info
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountInfo {
    pub account_id: i32,
    pub member_id: i32,
    pub username: String,
    pub display_name: String,
    pub ranks: Vec<RankName>,
    pub tier: Tier,
    pub is_staff: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(ranks: Vec<RankName>) -> SessionClaims {
        let now = Utc::now().timestamp();
        SessionClaims {
            sub: "gk".into(),
            account_id: 1,
            member_id: 2,
            ranks,
            exp: now + 3600,
            iat: now,
        }
    }

    fn account(is_active: bool) -> Account {
        Account {
            id: 1,
            member_id: 2,
            username: "gk".into(),
            password_hash: String::new(),
            is_active,
            is_staff: false,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_carries_identity_only() {
        let token = claims(vec![RankName::Gatekeeper]).create_token("secret").unwrap();
        let parsed = SessionClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.account_id, 1);
        assert_eq!(parsed.member_id, 2);
        assert!(parsed.ranks.is_empty());
        assert!(SessionClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_president_session_refused_once_excluded() {
        let token = claims(vec![RankName::President]).create_token("secret").unwrap();

        let president = SessionClaims::from_token(&token, "secret")
            .unwrap()
            .with_current_ranks(&account(true), ActiveRanks(vec![RankName::President]))
            .unwrap();
        assert!(president.require_executive().is_ok());

        let excluded = SessionClaims::from_token(&token, "secret")
            .unwrap()
            .with_current_ranks(
                &account(true),
                ActiveRanks(vec![RankName::Excluded, RankName::President]),
            );
        assert!(matches!(excluded, Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_session_refused_for_deactivated_account() {
        let session = claims(vec![]).with_current_ranks(&account(false), ActiveRanks(vec![RankName::Gatekeeper]));
        assert!(matches!(session, Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_session_refused_once_gatekeeper_rank_expires() {
        let session = claims(vec![]).with_current_ranks(&account(true), ActiveRanks(vec![RankName::LifeMember]));
        assert!(session.is_err());
    }

    #[test]
    fn test_requirements() {
        let gk = claims(vec![RankName::Gatekeeper]);
        assert!(gk.require_gatekeeper().is_ok());
        assert!(gk.require_committee().is_err());
        assert!(gk.require_librarian().is_err());

        let librarian = claims(vec![RankName::Librarian, RankName::Committee]);
        assert!(librarian.require_committee().is_ok());
        assert!(librarian.require_librarian().is_ok());
        assert!(librarian.require_executive().is_err());
    }
}
