//! Ranks and rank assignments repository

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::RankName,
        rank::{Rank, RankAssignment, TransferPlan},
    },
};

const ASSIGNMENT_SELECT: &str = r#"
    SELECT ra.id, ra.member_id, ra.rank_id, r.rank_name, ra.assignment_date, ra.expired_date
    FROM rank_assignments ra
    JOIN ranks r ON r.id = ra.rank_id
"#;

#[derive(Clone)]
pub struct RanksRepository {
    pool: Pool<Postgres>,
}

impl RanksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Make the ranks table hold exactly the known rank names.
    /// Returns (created, deleted).
    pub async fn sync_rank_table(&self) -> AppResult<(u64, u64)> {
        let names: Vec<String> = RankName::ALL.iter().map(|r| r.as_str().to_string()).collect();

        let created = sqlx::query(
            r#"
            INSERT INTO ranks (rank_name)
            SELECT UNNEST($1::text[])
            ON CONFLICT (rank_name) DO NOTHING
            "#,
        )
        .bind(&names)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let deleted = sqlx::query("DELETE FROM ranks WHERE NOT (rank_name = ANY($1))")
            .bind(&names)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok((created, deleted))
    }

    pub async fn list(&self) -> AppResult<Vec<Rank>> {
        let ranks = sqlx::query_as::<_, Rank>("SELECT id, rank_name FROM ranks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ranks)
    }

    pub async fn get_rank_id(&self, rank: RankName) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM ranks WHERE rank_name = $1")
            .bind(rank)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Rank {} missing from ranks table", rank)))
    }

    /// All assignments of a member, newest first
    pub async fn assignments_for_member(&self, member_id: i32) -> AppResult<Vec<RankAssignment>> {
        let sql = format!(
            "{} WHERE ra.member_id = $1 ORDER BY ra.assignment_date DESC, ra.id DESC",
            ASSIGNMENT_SELECT
        );
        let rows = sqlx::query_as::<_, RankAssignment>(&sql)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Assignments of the given ranks that are active on `day`
    pub async fn active_assignments(&self, ranks: &[RankName], day: NaiveDate) -> AppResult<Vec<RankAssignment>> {
        let sql = format!(
            "{} WHERE r.rank_name = ANY($1) AND (ra.expired_date IS NULL OR ra.expired_date > $2) ORDER BY ra.id",
            ASSIGNMENT_SELECT
        );
        let rows = sqlx::query_as::<_, RankAssignment>(&sql)
            .bind(ranks)
            .bind(day)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Give `rank` to each member that does not already hold it on `assignment_date`
    pub async fn assign(
        &self,
        member_ids: &[i32],
        rank: RankName,
        assignment_date: NaiveDate,
        expired_date: Option<NaiveDate>,
    ) -> AppResult<u64> {
        let rank_id = self.get_rank_id(rank).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO rank_assignments (member_id, rank_id, assignment_date, expired_date)
            SELECT m.id, $2, $3, $4
            FROM members m
            WHERE m.id = ANY($1)
              AND NOT EXISTS (
                  SELECT 1 FROM rank_assignments ra
                  WHERE ra.member_id = m.id AND ra.rank_id = $2
                    AND (ra.expired_date IS NULL OR ra.expired_date > $3)
              )
            "#,
        )
        .bind(member_ids)
        .bind(rank_id)
        .bind(assignment_date)
        .bind(expired_date)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Expire the active assignments of `rank` for the given members on `day`
    pub async fn expire(&self, member_ids: &[i32], rank: RankName, day: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE rank_assignments ra SET expired_date = $3
            FROM ranks r
            WHERE r.id = ra.rank_id AND r.rank_name = $2
              AND ra.member_id = ANY($1)
              AND (ra.expired_date IS NULL OR ra.expired_date > $3)
            "#,
        )
        .bind(member_ids)
        .bind(rank)
        .bind(day)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Expire every active GATEKEEPER assignment held by a non-committee member
    pub async fn purge_gatekeepers(&self, day: NaiveDate) -> AppResult<u64> {
        let mut committee: Vec<RankName> = RankName::COMMITTEE_POSITIONS.to_vec();
        committee.push(RankName::Committee);

        let result = sqlx::query(
            r#"
            UPDATE rank_assignments ra SET expired_date = $1
            FROM ranks r
            WHERE r.id = ra.rank_id AND r.rank_name = 'GATEKEEPER'
              AND (ra.expired_date IS NULL OR ra.expired_date > $1)
              AND NOT EXISTS (
                  SELECT 1 FROM rank_assignments c JOIN ranks cr ON cr.id = c.rank_id
                  WHERE c.member_id = ra.member_id AND cr.rank_name = ANY($2)
                    AND (c.expired_date IS NULL OR c.expired_date > $1)
              )
            "#,
        )
        .bind(day)
        .bind(&committee)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Apply a committee transfer plan atomically
    pub async fn apply_transfer(&self, plan: &TransferPlan, day: NaiveDate) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        if !plan.expire_assignment_ids.is_empty() {
            sqlx::query("UPDATE rank_assignments SET expired_date = $2 WHERE id = ANY($1)")
                .bind(&plan.expire_assignment_ids)
                .bind(day)
                .execute(&mut *tx)
                .await?;
        }

        for assignment in &plan.new_assignments {
            sqlx::query(
                r#"
                INSERT INTO rank_assignments (member_id, rank_id, assignment_date)
                SELECT $1, r.id, $3 FROM ranks r WHERE r.rank_name = $2
                "#,
            )
            .bind(assignment.member_id)
            .bind(assignment.rank)
            .bind(day)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
