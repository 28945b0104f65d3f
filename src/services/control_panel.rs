//! Control panel: bulk rank and membership operations for the committee

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        account::SessionClaims,
        enums::RankName,
        rank::{
            AssignRankRequest, ExpireRankRequest, NewAssignment, PositionChange, RankAssignment, Tier,
            TransferPlan,
        },
    },
    repository::Repository,
};

use super::today;

/// An operation offered on the control panel
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlPanelOperation {
    pub name: &'static str,
    pub description: &'static str,
    pub method: &'static str,
    pub path: &'static str,
    pub required_tier: Tier,
}

const OPERATIONS: &[ControlPanelOperation] = &[
    ControlPanelOperation {
        name: "assign_rank",
        description: "Give a rank to a list of members",
        method: "POST",
        path: "/api/v1/control-panel/ranks/assign",
        required_tier: Tier::Committee,
    },
    ControlPanelOperation {
        name: "expire_rank",
        description: "Expire a rank for a list of members",
        method: "POST",
        path: "/api/v1/control-panel/ranks/expire",
        required_tier: Tier::Committee,
    },
    ControlPanelOperation {
        name: "purge_gatekeepers",
        description: "Expire the gatekeeper rank of every member who is not on the committee",
        method: "POST",
        path: "/api/v1/control-panel/purge-gatekeepers",
        required_tier: Tier::Executive,
    },
    ControlPanelOperation {
        name: "expire_memberships",
        description: "Mark every membership as expired",
        method: "POST",
        path: "/api/v1/control-panel/expire-memberships",
        required_tier: Tier::Executive,
    },
    ControlPanelOperation {
        name: "committee_transfer",
        description: "Hand committee positions to new holders",
        method: "POST",
        path: "/api/v1/control-panel/committee-transfer",
        required_tier: Tier::Executive,
    },
];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkRankResult {
    pub rank: RankName,
    pub affected: u64,
}

fn check_positions(requested: &BTreeMap<RankName, i32>) -> AppResult<()> {
    match requested.keys().find(|r| !r.is_committee_position()) {
        Some(rank) => Err(AppError::Validation(format!(
            "positions: {} is not a committee position",
            rank
        ))),
        None => Ok(()),
    }
}

/// Work out which assignments a committee transfer expires and creates.
///
/// `current` holds the active assignments of every committee position and
/// of COMMITTEE itself.
pub fn plan_committee_transfer(
    current: &[RankAssignment],
    requested: &BTreeMap<RankName, i32>,
) -> AppResult<TransferPlan> {
    check_positions(requested)?;

    let mut plan = TransferPlan::default();
    let mut expired: BTreeSet<i32> = BTreeSet::new();

    for (&position, &incoming) in requested {
        let holders: Vec<&RankAssignment> = current.iter().filter(|a| a.rank_name == position).collect();
        let already_held = holders.iter().any(|a| a.member_id == incoming);
        let leaving: Vec<&RankAssignment> = holders.into_iter().filter(|a| a.member_id != incoming).collect();

        if already_held && leaving.is_empty() {
            continue;
        }

        let mut outgoing: Vec<i32> = Vec::new();
        for assignment in leaving {
            expired.insert(assignment.id);
            if !outgoing.contains(&assignment.member_id) {
                outgoing.push(assignment.member_id);
            }
        }
        if !already_held {
            plan.new_assignments.push(NewAssignment {
                member_id: incoming,
                rank: position,
            });
        }
        plan.changes.push(PositionChange {
            position,
            outgoing,
            incoming,
        });
    }

    // Positions each member holds once the transfer is done
    let mut positions_after: BTreeMap<i32, usize> = BTreeMap::new();
    for assignment in current {
        if assignment.rank_name.is_committee_position() && !expired.contains(&assignment.id) {
            *positions_after.entry(assignment.member_id).or_default() += 1;
        }
    }
    for assignment in &plan.new_assignments {
        *positions_after.entry(assignment.member_id).or_default() += 1;
    }

    let has_committee = |member_id: i32| {
        current
            .iter()
            .any(|a| a.member_id == member_id && a.rank_name == RankName::Committee)
    };

    for change in &plan.changes {
        if !has_committee(change.incoming) && !plan.committee_added.contains(&change.incoming) {
            plan.committee_added.push(change.incoming);
            plan.new_assignments.push(NewAssignment {
                member_id: change.incoming,
                rank: RankName::Committee,
            });
        }
    }

    let outgoing: BTreeSet<i32> = plan.changes.iter().flat_map(|c| c.outgoing.iter().copied()).collect();
    for member_id in outgoing {
        if positions_after.get(&member_id).copied().unwrap_or(0) > 0 {
            continue;
        }
        let committee: Vec<i32> = current
            .iter()
            .filter(|a| a.member_id == member_id && a.rank_name == RankName::Committee)
            .map(|a| a.id)
            .collect();
        if !committee.is_empty() {
            expired.extend(committee);
            plan.committee_removed.push(member_id);
        }
    }

    plan.expire_assignment_ids = expired.into_iter().collect();
    Ok(plan)
}

#[derive(Clone)]
pub struct ControlPanelService {
    repository: Repository,
}

impl ControlPanelService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Operations the caller is allowed to run
    pub fn operations(&self, claims: &SessionClaims) -> Vec<ControlPanelOperation> {
        let tier = claims.tier();
        OPERATIONS
            .iter()
            .filter(|op| tier >= op.required_tier)
            .cloned()
            .collect()
    }

    pub async fn purge_gatekeepers(&self) -> AppResult<u64> {
        let purged = self.repository.ranks.purge_gatekeepers(today()).await?;
        tracing::info!(purged, "Gatekeeper ranks purged");
        Ok(purged)
    }

    pub async fn expire_memberships(&self) -> AppResult<u64> {
        let expired = self.repository.members.expire_all_memberships().await?;
        tracing::info!(expired, "Memberships expired");
        Ok(expired)
    }

    /// Plan and apply a committee transfer in one transaction
    pub async fn committee_transfer(&self, requested: &BTreeMap<RankName, i32>) -> AppResult<TransferPlan> {
        check_positions(requested)?;
        let day = today();
        let incoming: Vec<i32> = requested.values().copied().collect();
        self.check_members_exist(&incoming).await?;

        let mut tracked: Vec<RankName> = RankName::COMMITTEE_POSITIONS.to_vec();
        tracked.push(RankName::Committee);
        let current = self.repository.ranks.active_assignments(&tracked, day).await?;

        let plan = plan_committee_transfer(&current, requested)?;
        if plan.is_empty() {
            tracing::info!("Committee transfer requested with no changes");
            return Ok(plan);
        }

        self.repository.ranks.apply_transfer(&plan, day).await?;
        for change in &plan.changes {
            tracing::info!(
                position = %change.position,
                incoming = change.incoming,
                outgoing = ?change.outgoing,
                "Committee position transferred"
            );
        }
        Ok(plan)
    }

    pub async fn assign_rank(&self, claims: &SessionClaims, data: &AssignRankRequest) -> AppResult<BulkRankResult> {
        require_rank_permission(claims, data.rank)?;
        self.check_members_exist(&data.member_ids).await?;

        let assignment_date = data.assignment_date.unwrap_or_else(today);
        if let Some(expired) = data.expired_date {
            if expired <= assignment_date {
                return Err(AppError::Validation(
                    "expired_date: must be after the assignment date".to_string(),
                ));
            }
        }

        let affected = self
            .repository
            .ranks
            .assign(&data.member_ids, data.rank, assignment_date, data.expired_date)
            .await?;
        tracing::info!(rank = %data.rank, affected, by = %claims.sub, "Rank assigned");
        Ok(BulkRankResult {
            rank: data.rank,
            affected,
        })
    }

    pub async fn expire_rank(&self, claims: &SessionClaims, data: &ExpireRankRequest) -> AppResult<BulkRankResult> {
        require_rank_permission(claims, data.rank)?;

        let affected = self
            .repository
            .ranks
            .expire(&data.member_ids, data.rank, today())
            .await?;
        tracing::info!(rank = %data.rank, affected, by = %claims.sub, "Rank expired");
        Ok(BulkRankResult {
            rank: data.rank,
            affected,
        })
    }

    async fn check_members_exist(&self, member_ids: &[i32]) -> AppResult<()> {
        for &id in member_ids {
            self.repository.members.get_by_id(id).await?;
        }
        Ok(())
    }
}

fn require_rank_permission(claims: &SessionClaims, rank: RankName) -> AppResult<()> {
    claims.require_committee()?;
    if rank.is_committee_position() {
        claims.require_executive()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn assignment(id: i32, member_id: i32, rank: RankName) -> RankAssignment {
        RankAssignment {
            id,
            member_id,
            rank_id: 0,
            rank_name: rank,
            assignment_date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
            expired_date: None,
        }
    }

    fn request(pairs: &[(RankName, i32)]) -> BTreeMap<RankName, i32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_rejects_non_position_ranks() {
        let result = plan_committee_transfer(&[], &request(&[(RankName::Gatekeeper, 1)]));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_unchanged_holder_is_a_no_op() {
        let current = vec![
            assignment(1, 10, RankName::President),
            assignment(2, 10, RankName::Committee),
        ];
        let plan = plan_committee_transfer(&current, &request(&[(RankName::President, 10)])).unwrap();
        assert!(plan.is_empty());
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_outgoing_holder_loses_committee() {
        let current = vec![
            assignment(1, 10, RankName::President),
            assignment(2, 10, RankName::Committee),
        ];
        let plan = plan_committee_transfer(&current, &request(&[(RankName::President, 20)])).unwrap();

        assert_eq!(plan.expire_assignment_ids, vec![1, 2]);
        assert_eq!(plan.committee_added, vec![20]);
        assert_eq!(plan.committee_removed, vec![10]);
        assert!(plan.new_assignments.contains(&NewAssignment {
            member_id: 20,
            rank: RankName::President
        }));
        assert!(plan.new_assignments.contains(&NewAssignment {
            member_id: 20,
            rank: RankName::Committee
        }));
    }

    #[test]
    fn test_outgoing_holder_with_other_position_keeps_committee() {
        let current = vec![
            assignment(1, 10, RankName::President),
            assignment(2, 10, RankName::Treasurer),
            assignment(3, 10, RankName::Committee),
            assignment(4, 20, RankName::Committee),
        ];
        let plan = plan_committee_transfer(&current, &request(&[(RankName::President, 20)])).unwrap();

        assert_eq!(plan.expire_assignment_ids, vec![1]);
        assert!(plan.committee_removed.is_empty());
        assert!(plan.committee_added.is_empty());
        assert_eq!(
            plan.new_assignments,
            vec![NewAssignment {
                member_id: 20,
                rank: RankName::President
            }]
        );
    }

    #[test]
    fn test_swap_keeps_both_on_committee() {
        let current = vec![
            assignment(1, 10, RankName::Secretary),
            assignment(2, 20, RankName::Treasurer),
            assignment(3, 10, RankName::Committee),
            assignment(4, 20, RankName::Committee),
        ];
        let plan = plan_committee_transfer(
            &current,
            &request(&[(RankName::Secretary, 20), (RankName::Treasurer, 10)]),
        )
        .unwrap();

        assert_eq!(plan.expire_assignment_ids, vec![1, 2]);
        assert!(plan.committee_removed.is_empty());
        assert!(plan.committee_added.is_empty());
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_vacant_position_filled() {
        let plan = plan_committee_transfer(&[], &request(&[(RankName::Librarian, 7)])).unwrap();
        assert!(plan.expire_assignment_ids.is_empty());
        assert_eq!(plan.changes[0].outgoing, Vec::<i32>::new());
        assert_eq!(plan.committee_added, vec![7]);
        assert_eq!(plan.new_assignments.len(), 2);
    }
}
