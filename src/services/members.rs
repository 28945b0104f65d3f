//! Member records, memberships and email preferences

use crate::{
    config::SiteConfig,
    error::{AppError, AppResult, BusinessRule},
    models::{
        account::SessionClaims,
        member::{CreateMember, CreateMembership, Member, MemberProfile, MemberQuery, MemberShort, MemberStatus, Membership, UpdateMember},
    },
    repository::Repository,
};

use super::{
    email::compose_email_preferences,
    queue::EmailQueue,
    today,
    tokens::{ActionTokens, TokenPurpose},
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
    queue: EmailQueue,
    tokens: ActionTokens,
    site: SiteConfig,
    prefs_token_hours: u64,
}

impl MembersService {
    pub fn new(
        repository: Repository,
        queue: EmailQueue,
        tokens: ActionTokens,
        site: SiteConfig,
        prefs_token_hours: u64,
    ) -> Self {
        Self {
            repository,
            queue,
            tokens,
            site,
            prefs_token_hours,
        }
    }

    /// Search members; the notes filter only applies for committee callers
    pub async fn search(&self, query: &MemberQuery, caller: &SessionClaims) -> AppResult<(Vec<MemberShort>, i64)> {
        self.repository
            .members
            .search(query, today(), caller.is_committee())
            .await
    }

    pub async fn get(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    /// Current flags of a member
    pub async fn status(&self, id: i32) -> AppResult<MemberStatus> {
        let member = self.repository.members.get_by_id(id).await?;
        let memberships = self.repository.members.memberships(id).await?;
        let assignments = self.repository.ranks.assignments_for_member(id).await?;
        Ok(MemberStatus::compute(&member, &memberships, &assignments, today()))
    }

    pub async fn profile(&self, id: i32) -> AppResult<MemberProfile> {
        let member = self.repository.members.get_by_id(id).await?;
        let memberships = self.repository.members.memberships(id).await?;
        let rank_assignments = self.repository.ranks.assignments_for_member(id).await?;
        let borrowed_items = self.repository.borrows.open_for_member(id).await?;
        let status = MemberStatus::compute(&member, &memberships, &rank_assignments, today());

        Ok(MemberProfile {
            member,
            status,
            memberships,
            rank_assignments,
            borrowed_items,
        })
    }

    /// New member with their first membership, sold by `gatekeeper_id`
    pub async fn create(&self, data: &CreateMember, gatekeeper_id: i32) -> AppResult<(Member, Membership)> {
        let (member, membership) = self
            .repository
            .members
            .create_with_membership(data, gatekeeper_id)
            .await?;
        tracing::info!(member_id = member.id, gatekeeper_id, "New member signed up");
        Ok((member, membership))
    }

    /// Sell another membership to an existing member
    pub async fn renew(&self, member_id: i32, data: &CreateMembership, gatekeeper_id: i32) -> AppResult<Membership> {
        self.repository.members.get_by_id(member_id).await?;
        let memberships = self.repository.members.memberships(member_id).await?;
        if memberships.iter().any(|m| !m.expired) {
            return Err(AppError::rule(
                BusinessRule::InvalidMembership,
                "Member already has a valid membership",
            ));
        }

        let membership = self
            .repository
            .members
            .add_membership(member_id, data, gatekeeper_id)
            .await?;
        tracing::info!(member_id, gatekeeper_id, "Membership renewed");
        Ok(membership)
    }

    pub async fn update(&self, id: i32, data: &UpdateMember) -> AppResult<Member> {
        self.repository.members.update(id, data).await
    }

    /// Mail a preferences link. Unknown addresses are ignored silently.
    pub async fn request_email_preferences(&self, email: &str) -> AppResult<()> {
        let Some(member) = self.repository.members.get_by_email(email).await? else {
            tracing::debug!("Email preferences requested for unknown address");
            return Ok(());
        };

        let token = self.tokens.issue(
            member.id,
            TokenPurpose::EmailPreferences,
            &[&member.email_address],
            self.prefs_token_hours,
        )?;
        self.queue
            .push(&compose_email_preferences(&self.site, &member, &token))
            .await
    }

    /// Apply preferences from a link; the link dies if the email address changed
    pub async fn update_email_preferences(&self, token: &str, receive_emails: bool) -> AppResult<Member> {
        let member_id = self.tokens.subject(token, TokenPurpose::EmailPreferences)?;
        let member = self.repository.members.get_by_id(member_id).await?;
        self.tokens
            .verify(token, TokenPurpose::EmailPreferences, &[&member.email_address])?;

        self.repository
            .members
            .set_receive_emails(member.id, receive_emails)
            .await?;
        tracing::info!(member_id, receive_emails, "Email preferences updated");
        self.repository.members.get_by_id(member_id).await
    }
}
