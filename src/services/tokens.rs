//! Signed one-time links for activation, password reset and email preferences.
//!
//! A token carries a fingerprint of the state it acts on, so it stops
//! verifying as soon as that state changes (account activated, password
//! changed, email address edited).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
    EmailPreferences,
}

#[derive(Debug, Serialize, Deserialize)]
struct ActionClaims {
    sub: i32,
    purpose: TokenPurpose,
    fp: String,
    exp: i64,
    iat: i64,
}

/// Hex sha256 over the given state parts
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct ActionTokens {
    secret: String,
}

impl ActionTokens {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: format!("action:{}", secret),
        }
    }

    pub fn issue(&self, subject: i32, purpose: TokenPurpose, state: &[&str], valid_hours: u64) -> AppResult<String> {
        let now = Utc::now();
        let claims = ActionClaims {
            sub: subject,
            purpose,
            fp: fingerprint(state),
            exp: (now + Duration::hours(valid_hours as i64)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Subject of a token for `purpose`, without checking its fingerprint yet
    pub fn subject(&self, token: &str, purpose: TokenPurpose) -> AppResult<i32> {
        Ok(self.decode(token, purpose)?.sub)
    }

    /// Confirm the token still matches `state`
    pub fn verify(&self, token: &str, purpose: TokenPurpose, state: &[&str]) -> AppResult<i32> {
        let claims = self.decode(token, purpose)?;
        if claims.fp != fingerprint(state) {
            return Err(invalid_link());
        }
        Ok(claims.sub)
    }

    fn decode(&self, token: &str, purpose: TokenPurpose) -> AppResult<ActionClaims> {
        let claims = decode::<ActionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| invalid_link())?
        .claims;
        if claims.purpose != purpose {
            return Err(invalid_link());
        }
        Ok(claims)
    }
}

fn invalid_link() -> AppError {
    AppError::BadRequest("This link is invalid or has expired".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_verifies_against_same_state() {
        let tokens = ActionTokens::new("secret");
        let token = tokens.issue(7, TokenPurpose::PasswordReset, &["hash-a"], 1).unwrap();
        assert_eq!(tokens.verify(&token, TokenPurpose::PasswordReset, &["hash-a"]).unwrap(), 7);
    }

    #[test]
    fn test_token_rejected_after_state_change() {
        let tokens = ActionTokens::new("secret");
        let token = tokens.issue(7, TokenPurpose::PasswordReset, &["hash-a"], 1).unwrap();
        assert!(tokens.verify(&token, TokenPurpose::PasswordReset, &["hash-b"]).is_err());
    }

    #[test]
    fn test_token_bound_to_purpose() {
        let tokens = ActionTokens::new("secret");
        let token = tokens.issue(7, TokenPurpose::Activation, &["false"], 1).unwrap();
        assert!(tokens.subject(&token, TokenPurpose::EmailPreferences).is_err());
        assert_eq!(tokens.subject(&token, TokenPurpose::Activation).unwrap(), 7);
    }

    #[test]
    fn test_session_secret_does_not_verify_action_tokens() {
        let token = ActionTokens::new("secret").issue(1, TokenPurpose::Activation, &[], 1).unwrap();
        assert!(crate::models::SessionClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_fingerprint_separates_parts() {
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
    }
}
