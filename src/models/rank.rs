//! Ranks, rank assignments and the permission tiers derived from them

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::RankName;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Rank {
    pub id: i32,
    pub rank_name: RankName,
}

/// A member holding a rank from `assignment_date` until `expired_date`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RankAssignment {
    pub id: i32,
    pub member_id: i32,
    pub rank_id: i32,
    pub rank_name: RankName,
    pub assignment_date: NaiveDate,
    pub expired_date: Option<NaiveDate>,
}

impl RankAssignment {
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.expired_date.map(|d| d > day).unwrap_or(true)
    }
}

/// Access tiers, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    None,
    Member,
    Gatekeeper,
    Committee,
    Executive,
}

/// The set of ranks a member currently holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActiveRanks(pub Vec<RankName>);

impl ActiveRanks {
    /// Collect the ranks active on `day` from a member's assignments
    pub fn from_assignments(assignments: &[RankAssignment], day: NaiveDate) -> Self {
        let mut ranks: Vec<RankName> = assignments
            .iter()
            .filter(|a| a.is_active_on(day))
            .map(|a| a.rank_name)
            .collect();
        ranks.sort();
        ranks.dedup();
        ActiveRanks(ranks)
    }

    pub fn has(&self, rank: RankName) -> bool {
        self.0.contains(&rank)
    }

    pub fn is_excluded(&self) -> bool {
        self.has(RankName::Excluded)
    }

    pub fn is_committee(&self) -> bool {
        self.has(RankName::Committee) || self.0.iter().any(|r| r.is_committee_position())
    }

    pub fn is_gatekeeper(&self) -> bool {
        self.has(RankName::Gatekeeper) || self.has(RankName::Webkeeper) || self.is_committee()
    }

    pub fn is_staff(&self) -> bool {
        self.0.iter().any(|r| r.is_staff())
    }

    pub fn is_executive(&self) -> bool {
        self.has(RankName::President) || self.has(RankName::VicePresident) || self.has(RankName::Webkeeper)
    }

    pub fn is_librarian(&self) -> bool {
        !self.is_excluded() && (self.has(RankName::Librarian) || self.is_executive())
    }

    pub fn is_life_member(&self) -> bool {
        self.has(RankName::LifeMember)
    }

    pub fn tier(&self) -> Tier {
        if self.is_excluded() {
            Tier::None
        } else if self.is_executive() {
            Tier::Executive
        } else if self.is_committee() {
            Tier::Committee
        } else if self.is_gatekeeper() {
            Tier::Gatekeeper
        } else {
            Tier::Member
        }
    }
}

/// Assign a rank to several members at once
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRankRequest {
    #[validate(length(min = 1, message = "At least one member is required"))]
    pub member_ids: Vec<i32>,
    pub rank: RankName,
    /// Defaults to today
    pub assignment_date: Option<NaiveDate>,
    pub expired_date: Option<NaiveDate>,
}

/// Expire a rank for several members
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExpireRankRequest {
    #[validate(length(min = 1, message = "At least one member is required"))]
    pub member_ids: Vec<i32>,
    pub rank: RankName,
}

/// Hand committee positions to new holders: `{ "PRESIDENT": 12, ... }`
#[derive(Debug, Deserialize, ToSchema)]
pub struct CommitteeTransferRequest {
    #[schema(value_type = Object)]
    pub positions: BTreeMap<RankName, i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NewAssignment {
    pub member_id: i32,
    pub rank: RankName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PositionChange {
    pub position: RankName,
    pub outgoing: Vec<i32>,
    pub incoming: i32,
}

/// Rank changes computed for a committee transfer
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TransferPlan {
    pub expire_assignment_ids: Vec<i32>,
    pub new_assignments: Vec<NewAssignment>,
    pub changes: Vec<PositionChange>,
    pub committee_added: Vec<i32>,
    pub committee_removed: Vec<i32>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.expire_assignment_ids.is_empty() && self.new_assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(rank: RankName, expired: Option<NaiveDate>) -> RankAssignment {
        RankAssignment {
            id: 1,
            member_id: 1,
            rank_id: 1,
            rank_name: rank,
            assignment_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            expired_date: expired,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 2, d).unwrap()
    }

    #[test]
    fn test_expired_on_its_expiry_day() {
        let a = assignment(RankName::Gatekeeper, Some(day(10)));
        assert!(a.is_active_on(day(9)));
        assert!(!a.is_active_on(day(10)));
    }

    #[test]
    fn test_tiers() {
        let gk = ActiveRanks::from_assignments(&[assignment(RankName::Gatekeeper, None)], day(1));
        assert_eq!(gk.tier(), Tier::Gatekeeper);

        let librarian = ActiveRanks::from_assignments(&[assignment(RankName::Librarian, None)], day(1));
        assert!(librarian.is_committee());
        assert!(librarian.is_gatekeeper());
        assert!(librarian.is_librarian());
        assert_eq!(librarian.tier(), Tier::Committee);

        let president = ActiveRanks(vec![RankName::President]);
        assert_eq!(president.tier(), Tier::Executive);
        assert!(president.is_librarian());
    }

    #[test]
    fn test_excluded_overrides_everything() {
        let ranks = ActiveRanks(vec![RankName::Excluded, RankName::President]);
        assert_eq!(ranks.tier(), Tier::None);
        assert!(!ranks.is_librarian());
    }

    #[test]
    fn test_expired_ranks_ignored() {
        let ranks = ActiveRanks::from_assignments(
            &[
                assignment(RankName::Committee, Some(day(1))),
                assignment(RankName::Gatekeeper, None),
            ],
            day(5),
        );
        assert_eq!(ranks.0, vec![RankName::Gatekeeper]);
    }
}
