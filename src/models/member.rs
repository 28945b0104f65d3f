//! Member and membership models

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::borrow::BorrowRecord;
use super::rank::{ActiveRanks, RankAssignment, Tier};

/// Full member record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub preferred_name: String,
    pub pronouns: String,
    pub email_address: String,
    pub student_number: String,
    pub join_date: NaiveDate,
    /// Committee-only notes
    pub notes: String,
    /// Opted in to the mailing list
    pub receive_emails: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn display_name(&self) -> String {
        let name = if self.preferred_name.is_empty() {
            &self.first_name
        } else {
            &self.preferred_name
        };
        if self.pronouns.is_empty() {
            format!("{} {}", name, self.last_name)
        } else {
            format!("{} {} ({})", name, self.last_name, self.pronouns)
        }
    }

    pub fn greeting_name(&self) -> &str {
        if self.preferred_name.is_empty() {
            &self.first_name
        } else {
            &self.preferred_name
        }
    }

    /// Members who joined this calendar year
    pub fn is_fresher_on(&self, today: NaiveDate) -> bool {
        self.join_date.year() == today.year()
    }
}

/// Short member representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MemberShort {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub preferred_name: String,
    pub pronouns: String,
    pub student_number: String,
    pub join_date: NaiveDate,
    pub has_valid_membership: bool,
}

/// One purchased membership
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Membership {
    pub id: i32,
    pub member_id: i32,
    pub date_purchased: NaiveDate,
    pub guild_member: bool,
    #[schema(value_type = f64)]
    pub amount_paid: Decimal,
    pub expired: bool,
    pub phone_number: String,
    pub authorising_gatekeeper_id: Option<i32>,
}

/// Flags derived from a member's ranks and memberships
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberStatus {
    pub ranks: ActiveRanks,
    pub tier: Tier,
    pub is_fresher: bool,
    pub is_gatekeeper: bool,
    pub is_committee: bool,
    pub is_excluded: bool,
    pub has_valid_membership: bool,
}

impl MemberStatus {
    pub fn compute(
        member: &Member,
        memberships: &[Membership],
        assignments: &[RankAssignment],
        today: NaiveDate,
    ) -> Self {
        let ranks = ActiveRanks::from_assignments(assignments, today);
        let has_valid_membership =
            ranks.is_life_member() || memberships.iter().any(|m| !m.expired);
        Self {
            tier: ranks.tier(),
            is_fresher: member.is_fresher_on(today),
            is_gatekeeper: ranks.is_gatekeeper(),
            is_committee: ranks.is_committee(),
            is_excluded: ranks.is_excluded(),
            has_valid_membership,
            ranks,
        }
    }

    /// Whether the member may take items out of the library
    pub fn can_borrow(&self) -> bool {
        self.has_valid_membership && !self.is_excluded
    }
}

/// Member profile as shown to gatekeepers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberProfile {
    pub member: Member,
    pub status: MemberStatus,
    pub memberships: Vec<Membership>,
    pub rank_assignments: Vec<RankAssignment>,
    pub borrowed_items: Vec<BorrowRecord>,
}

/// Member list query parameters
#[derive(Debug, Deserialize, Validate, IntoParams, ToSchema)]
pub struct MemberQuery {
    /// Matches first, last or preferred name
    pub name: Option<String>,
    /// Only members with notes (committee only)
    pub has_notes: Option<bool>,
    #[validate(range(min = 1, max = 1_000_000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 200, message = "Page size must be between 1 and 200"))]
    pub per_page: Option<i64>,
}

/// New member signup, creating their first membership
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 200, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 200, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(max = 200))]
    pub preferred_name: Option<String>,
    #[validate(length(max = 200))]
    pub pronouns: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email_address: String,
    #[validate(length(max = 10, message = "Student number is at most 10 characters"))]
    pub student_number: Option<String>,
    pub receive_emails: Option<bool>,
    #[validate(nested)]
    pub membership: CreateMembership,
}

/// Membership purchase details
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMembership {
    pub guild_member: bool,
    #[schema(value_type = f64)]
    pub amount_paid: Decimal,
    #[validate(length(min = 6, max = 20, message = "Phone number must be 6-20 characters"))]
    pub phone_number: String,
}

/// Update member request (committee)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 200))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub last_name: Option<String>,
    #[validate(length(max = 200))]
    pub preferred_name: Option<String>,
    #[validate(length(max = 200))]
    pub pronouns: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email_address: Option<String>,
    #[validate(length(max = 10))]
    pub student_number: Option<String>,
    pub notes: Option<String>,
    pub receive_emails: Option<bool>,
}

/// Request for an email preferences link
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailPreferencesRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Apply email preferences with a token from the preferences link
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEmailPreferences {
    pub token: String,
    pub receive_emails: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::RankName;

    fn member(join: NaiveDate) -> Member {
        Member {
            id: 1,
            first_name: "Donald".into(),
            last_name: "Sutherland".into(),
            preferred_name: String::new(),
            pronouns: "he/him".into(),
            email_address: "donald@sutherland.id.au".into(),
            student_number: "12345678".into(),
            join_date: join,
            notes: String::new(),
            receive_emails: true,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    fn membership(expired: bool) -> Membership {
        Membership {
            id: 1,
            member_id: 1,
            date_purchased: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            guild_member: true,
            amount_paid: Decimal::new(700, 2),
            expired,
            phone_number: "0123456789".into(),
            authorising_gatekeeper_id: None,
        }
    }

    #[test]
    fn test_display_name_prefers_preferred_name() {
        let mut m = member(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(m.display_name(), "Donald Sutherland (he/him)");
        m.preferred_name = "Don".into();
        assert_eq!(m.display_name(), "Don Sutherland (he/him)");
    }

    #[test]
    fn test_fresher_is_calendar_year() {
        let m = member(NaiveDate::from_ymd_opt(2021, 2, 14).unwrap());
        assert!(m.is_fresher_on(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()));
        assert!(!m.is_fresher_on(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));
    }

    #[test]
    fn test_life_member_needs_no_membership() {
        let today = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let m = member(today);
        let life = RankAssignment {
            id: 1,
            member_id: 1,
            rank_id: 5,
            rank_name: RankName::LifeMember,
            assignment_date: today,
            expired_date: None,
        };
        let status = MemberStatus::compute(&m, &[membership(true)], &[life], today);
        assert!(status.has_valid_membership);
        assert!(status.can_borrow());

        let status = MemberStatus::compute(&m, &[membership(true)], &[], today);
        assert!(!status.can_borrow());
    }
}
