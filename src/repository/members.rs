//! Members repository for database operations

use chrono::{NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use super::{conflict_on_unique, page_offset};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EmailAudience, RankName},
        member::{CreateMember, CreateMembership, Member, MemberQuery, MemberShort, Membership, UpdateMember},
    },
};

/// SQL fragment: the member row `m` holds a valid membership on `$1`
const VALID_MEMBERSHIP_SQL: &str = r#"(
    EXISTS (SELECT 1 FROM memberships ms WHERE ms.member_id = m.id AND NOT ms.expired)
    OR EXISTS (
        SELECT 1 FROM rank_assignments ra JOIN ranks r ON r.id = ra.rank_id
        WHERE ra.member_id = m.id AND r.rank_name = 'LIFE-MEMBER'
          AND (ra.expired_date IS NULL OR ra.expired_date > $1)
    )
)"#;

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Find member by email address (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE lower(email_address) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    /// Search members by name, paginated
    pub async fn search(
        &self,
        query: &MemberQuery,
        today: NaiveDate,
        filter_notes: bool,
    ) -> AppResult<(Vec<MemberShort>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(25).clamp(1, 200);
        let offset = page_offset(page, per_page)?;

        let mut conditions = vec!["TRUE".to_string()];
        let mut idx = 2;
        let name_pattern = query
            .name
            .as_ref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("%{}%", n.trim()));

        if name_pattern.is_some() {
            conditions.push(format!(
                "(m.first_name ILIKE ${0} OR m.last_name ILIKE ${0} OR m.preferred_name ILIKE ${0})",
                idx
            ));
            idx += 1;
        }
        if filter_notes && query.has_notes == Some(true) {
            conditions.push("m.notes <> ''".to_string());
        }
        let where_clause = conditions.join(" AND ");

        let count_sql = format!(
            "SELECT COUNT(*) FROM members m WHERE {} AND $1::date IS NOT NULL",
            where_clause
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(today);
        if let Some(ref pattern) = name_pattern {
            count_query = count_query.bind(pattern);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let list_sql = format!(
            r#"
            SELECT m.id, m.first_name, m.last_name, m.preferred_name, m.pronouns,
                   m.student_number, m.join_date,
                   {valid} AS has_valid_membership
            FROM members m
            WHERE {where_clause}
            ORDER BY m.last_name, m.first_name
            LIMIT ${limit} OFFSET ${offset}
            "#,
            valid = VALID_MEMBERSHIP_SQL,
            where_clause = where_clause,
            limit = idx,
            offset = idx + 1,
        );
        let mut list_query = sqlx::query_as::<_, MemberShort>(&list_sql).bind(today);
        if let Some(ref pattern) = name_pattern {
            list_query = list_query.bind(pattern);
        }
        let members = list_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((members, total))
    }

    /// Create a member together with their first membership
    pub async fn create_with_membership(
        &self,
        data: &CreateMember,
        authorising_gatekeeper_id: i32,
    ) -> AppResult<(Member, Membership)> {
        let mut tx = self.pool.begin().await?;

        let member = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (first_name, last_name, preferred_name, pronouns,
                                 email_address, student_number, receive_emails)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(data.first_name.trim())
        .bind(data.last_name.trim())
        .bind(data.preferred_name.as_deref().unwrap_or("").trim())
        .bind(data.pronouns.as_deref().unwrap_or(""))
        .bind(data.email_address.trim())
        .bind(data.student_number.as_deref().unwrap_or(""))
        .bind(data.receive_emails.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "A member with this email address already exists"))?;

        let membership = insert_membership(&mut tx, member.id, &data.membership, authorising_gatekeeper_id).await?;

        tx.commit().await?;
        Ok((member, membership))
    }

    /// Add a membership for an existing member
    pub async fn add_membership(
        &self,
        member_id: i32,
        data: &CreateMembership,
        authorising_gatekeeper_id: i32,
    ) -> AppResult<Membership> {
        let mut tx = self.pool.begin().await?;
        let membership = insert_membership(&mut tx, member_id, data, authorising_gatekeeper_id).await?;
        tx.commit().await?;
        Ok(membership)
    }

    /// Memberships of a member, newest first
    pub async fn memberships(&self, member_id: i32) -> AppResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE member_id = $1 ORDER BY date_purchased DESC, id DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Update member details
    pub async fn update(&self, id: i32, data: &UpdateMember) -> AppResult<Member> {
        let now = Utc::now();
        let mut sets = vec!["modified_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.first_name, "first_name");
        add_field!(data.last_name, "last_name");
        add_field!(data.preferred_name, "preferred_name");
        add_field!(data.pronouns, "pronouns");
        add_field!(data.email_address, "email_address");
        add_field!(data.student_number, "student_number");
        add_field!(data.notes, "notes");
        add_field!(data.receive_emails, "receive_emails");

        let query = format!(
            "UPDATE members SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Member>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.first_name);
        bind_field!(data.last_name);
        bind_field!(data.preferred_name);
        bind_field!(data.pronouns);
        bind_field!(data.email_address);
        bind_field!(data.student_number);
        bind_field!(data.notes);
        bind_field!(data.receive_emails);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "A member with this email address already exists"))?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Set the mailing list preference
    pub async fn set_receive_emails(&self, id: i32, receive_emails: bool) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE members SET receive_emails = $1, modified_at = NOW() WHERE id = $2",
        )
        .bind(receive_emails)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }
        Ok(())
    }

    /// Mark every membership as expired, returning how many changed
    pub async fn expire_all_memberships(&self) -> AppResult<u64> {
        let result = sqlx::query("UPDATE memberships SET expired = TRUE WHERE NOT expired")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Members opted in to email who belong to `audience` on `today`
    pub async fn email_recipients(&self, audience: EmailAudience, today: NaiveDate) -> AppResult<Vec<Member>> {
        let audience_clause = match audience {
            EmailAudience::AllMembers => "TRUE".to_string(),
            EmailAudience::CurrentMembers => VALID_MEMBERSHIP_SQL.to_string(),
            EmailAudience::Committee => rank_clause(&committee_ranks()),
            EmailAudience::Gatekeepers => {
                let mut ranks = committee_ranks();
                ranks.push(RankName::Gatekeeper);
                ranks.push(RankName::Webkeeper);
                rank_clause(&ranks)
            }
        };

        let sql = format!(
            r#"
            SELECT m.* FROM members m
            WHERE m.receive_emails AND {}
              AND NOT EXISTS (
                  SELECT 1 FROM rank_assignments ra JOIN ranks r ON r.id = ra.rank_id
                  WHERE ra.member_id = m.id AND r.rank_name = 'EXCLUDED'
                    AND (ra.expired_date IS NULL OR ra.expired_date > $1)
              )
            ORDER BY m.id
            "#,
            audience_clause
        );

        let members = sqlx::query_as::<_, Member>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }
}

fn committee_ranks() -> Vec<RankName> {
    let mut ranks = RankName::COMMITTEE_POSITIONS.to_vec();
    ranks.push(RankName::Committee);
    ranks
}

/// SQL fragment: the member row `m` holds one of `ranks` on `$1`
fn rank_clause(ranks: &[RankName]) -> String {
    let names: Vec<String> = ranks.iter().map(|r| format!("'{}'", r.as_str())).collect();
    format!(
        r#"EXISTS (
            SELECT 1 FROM rank_assignments ra JOIN ranks r ON r.id = ra.rank_id
            WHERE ra.member_id = m.id AND r.rank_name IN ({})
              AND (ra.expired_date IS NULL OR ra.expired_date > $1)
        )"#,
        names.join(", ")
    )
}

async fn insert_membership(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    member_id: i32,
    data: &CreateMembership,
    authorising_gatekeeper_id: i32,
) -> AppResult<Membership> {
    let membership = sqlx::query_as::<_, Membership>(
        r#"
        INSERT INTO memberships (member_id, guild_member, amount_paid, phone_number, authorising_gatekeeper_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(member_id)
    .bind(data.guild_member)
    .bind(data.amount_paid)
    .bind(data.phone_number.trim())
    .bind(authorising_gatekeeper_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(membership)
}
