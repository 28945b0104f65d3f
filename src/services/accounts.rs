//! Accounts: signup, activation, login, passwords and permission sync

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::{AuthConfig, SiteConfig},
    error::{AppError, AppResult},
    models::{
        account::{Account, AccountInfo, LoginRequest, SessionClaims, SignupRequest},
        enums::RankName,
        member::MemberStatus,
        rank::{ActiveRanks, RankAssignment},
    },
    repository::Repository,
};

use super::{
    email::{compose_activation, compose_password_reset},
    queue::EmailQueue,
    today,
    tokens::{ActionTokens, TokenPurpose},
};

const BAD_CREDENTIALS: &str = "Invalid username or password";

/// Verified against when the username is unknown, so a miss costs as much as a wrong password
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("phylactery-dummy-password").ok());

/// Outcome of the permission sync job
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionSyncReport {
    pub checked: usize,
    pub deactivated: usize,
    pub staff_changed: usize,
}

/// Permission flags an account should carry given its member's ranks
pub fn desired_flags(account: &Account, ranks: &ActiveRanks) -> (bool, bool) {
    let allowed = ranks.is_gatekeeper() && !ranks.is_excluded();
    let is_active = account.is_active && allowed;
    let is_staff = allowed && ranks.is_staff();
    (is_active, is_staff)
}

#[derive(Clone)]
pub struct AccountsService {
    repository: Repository,
    queue: EmailQueue,
    tokens: ActionTokens,
    config: AuthConfig,
    site: SiteConfig,
}

impl AccountsService {
    pub fn new(
        repository: Repository,
        queue: EmailQueue,
        tokens: ActionTokens,
        config: AuthConfig,
        site: SiteConfig,
    ) -> Self {
        Self {
            repository,
            queue,
            tokens,
            config,
            site,
        }
    }

    async fn member_status(&self, member_id: i32) -> AppResult<MemberStatus> {
        let member = self.repository.members.get_by_id(member_id).await?;
        let memberships = self.repository.members.memberships(member_id).await?;
        let assignments = self.repository.ranks.assignments_for_member(member_id).await?;
        Ok(MemberStatus::compute(&member, &memberships, &assignments, today()))
    }

    /// Create an inactive account for a gatekeeper and mail the activation link.
    /// Callers always get the same answer, whatever happened.
    pub async fn signup(&self, request: &SignupRequest) -> AppResult<()> {
        let Some(member) = self.repository.members.get_by_email(&request.email).await? else {
            tracing::info!("Signup for an unknown email address ignored");
            return Ok(());
        };

        let status = self.member_status(member.id).await?;
        if !status.is_gatekeeper || status.is_excluded {
            tracing::info!(member_id = member.id, "Signup by a non-gatekeeper ignored");
            return Ok(());
        }
        if self.repository.accounts.get_by_member(member.id).await?.is_some() {
            tracing::info!(member_id = member.id, "Signup for a member who already has an account ignored");
            return Ok(());
        }
        if self.repository.accounts.get_by_username(&request.username).await?.is_some() {
            tracing::info!(member_id = member.id, "Signup with a taken username ignored");
            return Ok(());
        }

        let hash = hash_password(&request.password)?;
        let account = self
            .repository
            .accounts
            .create(member.id, request.username.trim(), &hash, status.ranks.is_staff())
            .await?;

        let token = self.tokens.issue(
            account.id,
            TokenPurpose::Activation,
            &[&account.is_active.to_string()],
            self.config.activation_token_hours,
        )?;
        self.queue
            .push(&compose_activation(&self.site, &member.email_address, &account.username, &token))
            .await?;

        tracing::info!(account_id = account.id, member_id = member.id, "Account created, activation pending");
        Ok(())
    }

    pub async fn activate(&self, token: &str) -> AppResult<()> {
        let account_id = self.tokens.subject(token, TokenPurpose::Activation)?;
        let account = self.repository.accounts.get_by_id(account_id).await?;
        self.tokens
            .verify(token, TokenPurpose::Activation, &[&account.is_active.to_string()])?;

        self.repository.accounts.activate(account.id).await?;
        tracing::info!(account_id, "Account activated");
        Ok(())
    }

    /// Check credentials and issue a session token
    pub async fn login(&self, request: &LoginRequest) -> AppResult<(String, AccountInfo)> {
        let Some(account) = self.repository.accounts.get_by_username(&request.username).await? else {
            if let Some(hash) = DUMMY_HASH.as_deref() {
                verify_password(hash, &request.password)?;
            }
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        };

        if !verify_password(&account.password_hash, &request.password)? {
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        }

        let status = self.member_status(account.member_id).await?;
        if !account.is_active || !status.is_gatekeeper || status.is_excluded {
            tracing::info!(account_id = account.id, "Login refused for inactive or unauthorised account");
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        }

        self.repository.accounts.touch_last_login(account.id).await?;

        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: account.username.clone(),
            account_id: account.id,
            member_id: account.member_id,
            ranks: status.ranks.0.clone(),
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        let info = self.info(&account, status.ranks).await?;
        Ok((token, info))
    }

    /// Decode a session token and load the caller's current standing
    pub async fn authenticate(&self, token: &str) -> AppResult<SessionClaims> {
        let claims = SessionClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        let account = match self.repository.accounts.get_by_id(claims.account_id).await {
            Ok(account) => account,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Authentication("Session is no longer valid".to_string()))
            }
            Err(e) => return Err(e),
        };
        let assignments = self.repository.ranks.assignments_for_member(account.member_id).await?;
        let ranks = ActiveRanks::from_assignments(&assignments, today());

        claims.with_current_ranks(&account, ranks).map_err(|e| {
            tracing::info!(account_id = account.id, "Session refused after a permission change");
            e
        })
    }

    pub async fn me(&self, claims: &SessionClaims) -> AppResult<AccountInfo> {
        let account = self.repository.accounts.get_by_id(claims.account_id).await?;
        let status = self.member_status(account.member_id).await?;
        self.info(&account, status.ranks).await
    }

    async fn info(&self, account: &Account, ranks: ActiveRanks) -> AppResult<AccountInfo> {
        let member = self.repository.members.get_by_id(account.member_id).await?;
        Ok(AccountInfo {
            account_id: account.id,
            member_id: account.member_id,
            username: account.username.clone(),
            display_name: member.display_name(),
            tier: ranks.tier(),
            ranks: ranks.0,
            is_staff: account.is_staff,
        })
    }

    pub async fn change_password(&self, account_id: i32, current: &str, new_password: &str) -> AppResult<()> {
        let account = self.repository.accounts.get_by_id(account_id).await?;
        if !verify_password(&account.password_hash, current)? {
            return Err(AppError::Authentication("Current password is incorrect".to_string()));
        }
        let hash = hash_password(new_password)?;
        self.repository.accounts.set_password(account.id, &hash).await?;
        tracing::info!(account_id, "Password changed");
        Ok(())
    }

    /// Mail a reset link to the account of the member with this email, if any
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Some(member) = self.repository.members.get_by_email(email).await? else {
            return Ok(());
        };
        let Some(account) = self.repository.accounts.get_by_member(member.id).await? else {
            return Ok(());
        };
        if !account.is_active {
            return Ok(());
        }

        let token = self.tokens.issue(
            account.id,
            TokenPurpose::PasswordReset,
            &[&account.password_hash],
            self.config.password_reset_token_hours,
        )?;
        self.queue
            .push(&compose_password_reset(&self.site, &member.email_address, &account.username, &token))
            .await
    }

    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> AppResult<()> {
        let account_id = self.tokens.subject(token, TokenPurpose::PasswordReset)?;
        let account = self.repository.accounts.get_by_id(account_id).await?;
        self.tokens
            .verify(token, TokenPurpose::PasswordReset, &[&account.password_hash])?;

        let hash = hash_password(new_password)?;
        self.repository.accounts.set_password(account.id, &hash).await?;
        tracing::info!(account_id, "Password reset");
        Ok(())
    }

    /// Bring every account's flags in line with its member's ranks on `day`
    pub async fn sync_permissions(&self, day: NaiveDate) -> AppResult<PermissionSyncReport> {
        let accounts = self.repository.accounts.list_all().await?;
        let assignments = self.repository.ranks.active_assignments(RankName::ALL, day).await?;

        let mut by_member: HashMap<i32, Vec<RankAssignment>> = HashMap::new();
        for assignment in assignments {
            by_member.entry(assignment.member_id).or_default().push(assignment);
        }

        let mut report = PermissionSyncReport {
            checked: accounts.len(),
            ..Default::default()
        };

        for account in &accounts {
            let ranks = ActiveRanks::from_assignments(
                by_member.get(&account.member_id).map(Vec::as_slice).unwrap_or(&[]),
                day,
            );
            let (is_active, is_staff) = desired_flags(account, &ranks);
            if is_active == account.is_active && is_staff == account.is_staff {
                continue;
            }

            self.repository
                .accounts
                .set_flags(account.id, is_active, is_staff)
                .await?;
            if account.is_active && !is_active {
                report.deactivated += 1;
                tracing::info!(account_id = account.id, username = %account.username, "Account deactivated");
            }
            if account.is_staff != is_staff {
                report.staff_changed += 1;
                tracing::info!(account_id = account.id, is_staff, "Staff flag updated");
            }
        }

        Ok(report)
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(is_active: bool, is_staff: bool) -> Account {
        Account {
            id: 1,
            member_id: 1,
            username: "gk".into(),
            password_hash: String::new(),
            is_active,
            is_staff,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "battery staple").unwrap());
    }

    #[test]
    fn test_dummy_hash_rejects_any_password() {
        let hash = DUMMY_HASH.as_deref().unwrap();
        assert!(!verify_password(hash, "hunter22").unwrap());
    }

    #[test]
    fn test_lapsed_gatekeeper_deactivated() {
        let flags = desired_flags(&account(true, false), &ActiveRanks(vec![]));
        assert_eq!(flags, (false, false));
    }

    #[test]
    fn test_inactive_account_stays_inactive() {
        let flags = desired_flags(&account(false, false), &ActiveRanks(vec![RankName::Gatekeeper]));
        assert_eq!(flags, (false, false));
    }

    #[test]
    fn test_committee_position_is_staff() {
        let flags = desired_flags(
            &account(true, false),
            &ActiveRanks(vec![RankName::Treasurer, RankName::Committee]),
        );
        assert_eq!(flags, (true, true));
    }

    #[test]
    fn test_excluded_loses_everything() {
        let flags = desired_flags(
            &account(true, true),
            &ActiveRanks(vec![RankName::Excluded, RankName::President]),
        );
        assert_eq!(flags, (false, false));
    }
}
