//! Library catalogue, tags and internal lending

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult, BusinessRule},
    models::{
        borrow::{BorrowRecord, BorrowRecordDetails, BorrowRequest},
        enums::ItemType,
        item::{check_player_range, AvailabilityInfo, CreateItem, Item, ItemDetails, ItemListEntry, ItemQuery, ItemSummary, LendingState, UpdateItem},
        member::MemberStatus,
        tag::{Tag, TagEdge, TagRefreshReport, TagWithParents},
    },
    repository::{borrows::NewBorrow, Repository},
    slug,
};

use super::{availability, tagging, today, unique_ids};

#[derive(Clone)]
pub struct LibraryService {
    repository: Repository,
    policy: LibraryConfig,
}

impl LibraryService {
    pub fn new(repository: Repository, policy: LibraryConfig) -> Self {
        Self { repository, policy }
    }

    // =========================================================================
    // AVAILABILITY
    // =========================================================================

    async fn lending_states(&self, item_ids: &[i32], day: NaiveDate) -> AppResult<HashMap<i32, LendingState>> {
        self.repository.items.lending_states(item_ids, day).await
    }

    async fn availability_map(&self, items: &[Item], day: NaiveDate) -> AppResult<HashMap<i32, AvailabilityInfo>> {
        let ids: Vec<i32> = items.iter().map(|i| i.id).collect();
        let states = self.lending_states(&ids, day).await?;
        let empty = LendingState::default();
        Ok(items
            .iter()
            .map(|item| {
                let state = states.get(&item.id).unwrap_or(&empty);
                (item.id, availability::compute(state, item.is_borrowable, day, &self.policy))
            })
            .collect())
    }

    pub async fn availability(&self, item: &Item) -> AppResult<AvailabilityInfo> {
        let mut map = self.availability_map(std::slice::from_ref(item), today()).await?;
        map.remove(&item.id)
            .ok_or_else(|| AppError::Internal(format!("No availability for item {}", item.id)))
    }

    // =========================================================================
    // ITEMS
    // =========================================================================

    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<(Vec<ItemListEntry>, i64)> {
        let (items, total) = self.repository.items.search(query).await?;
        let mut availability = self.availability_map(&items, today()).await?;
        let entries = items
            .into_iter()
            .filter_map(|item| {
                let availability = availability.remove(&item.id)?;
                Some(ItemListEntry { item, availability })
            })
            .collect();
        Ok((entries, total))
    }

    async fn details(&self, item: Item) -> AppResult<ItemDetails> {
        let base_tags = self.repository.tags.base_tags(item.id).await?;
        let computed_tags = self.repository.tags.computed_tags(item.id).await?;
        let availability = self.availability(&item).await?;
        Ok(ItemDetails {
            item,
            base_tags,
            computed_tags,
            availability,
        })
    }

    pub async fn get_item(&self, id: i32) -> AppResult<ItemDetails> {
        let item = self.repository.items.get_by_id(id).await?;
        self.details(item).await
    }

    pub async fn get_item_by_slug(&self, slug: &str) -> AppResult<ItemDetails> {
        let item = self.repository.items.get_by_slug(slug).await?;
        self.details(item).await
    }

    async fn unique_slug(&self, source: &str, exclude_id: Option<i32>) -> AppResult<String> {
        let mut base = slug::slugify(source);
        if base.is_empty() {
            base = "item".to_string();
        }
        let mut attempt = 1;
        loop {
            let candidate = slug::candidate(&base, attempt);
            if !self.repository.items.slug_exists(&candidate, exclude_id).await? {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    pub async fn create_item(&self, data: &CreateItem) -> AppResult<ItemDetails> {
        check_player_range(data.min_players, data.max_players)?;

        let slug = self
            .unique_slug(data.slug.as_deref().unwrap_or(&data.name), None)
            .await?;
        let item = self.repository.items.create(data, &slug).await?;

        if let Some(ref names) = data.tags {
            let tags = self.repository.tags.get_or_create(names).await?;
            let ids: Vec<i32> = tags.iter().map(|t| t.id).collect();
            self.repository.tags.set_base_tags(item.id, &ids).await?;
        }

        let edges = self.repository.tags.edges().await?;
        self.refresh_computed_tags(&item, &edges).await?;

        tracing::info!(item_id = item.id, slug = %item.slug, "Item created");
        self.details(item).await
    }

    pub async fn update_item(&self, id: i32, data: &UpdateItem) -> AppResult<ItemDetails> {
        let existing = self.repository.items.get_by_id(id).await?;
        check_player_range(
            data.min_players.or(existing.min_players),
            data.max_players.or(existing.max_players),
        )?;

        let item = match data.slug {
            Some(ref requested) => {
                let slug = slug::slugify(requested);
                if slug.is_empty() {
                    return Err(AppError::Validation("slug: must contain letters or digits".to_string()));
                }
                if self.repository.items.slug_exists(&slug, Some(id)).await? {
                    return Err(AppError::Conflict("An item with this slug already exists".to_string()));
                }
                let normalized = UpdateItem {
                    slug: Some(slug),
                    ..data.clone()
                };
                self.repository.items.update(id, &normalized).await?
            }
            None => self.repository.items.update(id, data).await?,
        };

        let edges = self.repository.tags.edges().await?;
        self.refresh_computed_tags(&item, &edges).await?;
        self.details(item).await
    }

    pub async fn delete_item(&self, id: i32) -> AppResult<()> {
        self.repository.items.delete(id).await?;
        tracing::info!(item_id = id, "Item deleted");
        Ok(())
    }

    /// Random item of a type, or of any type
    pub async fn random_item(&self, item_type: Option<ItemType>) -> AppResult<ItemSummary> {
        self.repository
            .items
            .random(item_type)
            .await?
            .map(ItemSummary::from)
            .ok_or_else(|| AppError::NotFound("No items found".to_string()))
    }

    pub async fn all_items(&self) -> AppResult<Vec<ItemSummary>> {
        let items = self.repository.items.all().await?;
        Ok(items.into_iter().map(ItemSummary::from).collect())
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    pub async fn list_tags(&self) -> AppResult<Vec<TagWithParents>> {
        self.repository.tags.list_with_parents().await
    }

    pub async fn set_base_tags(&self, item_id: i32, names: &[String]) -> AppResult<ItemDetails> {
        let item = self.repository.items.get_by_id(item_id).await?;
        let tags = self.repository.tags.get_or_create(names).await?;
        let ids: Vec<i32> = tags.iter().map(|t| t.id).collect();
        self.repository.tags.set_base_tags(item.id, &ids).await?;

        let edges = self.repository.tags.edges().await?;
        self.refresh_computed_tags(&item, &edges).await?;
        self.details(item).await
    }

    /// Replace a tag's parents, then recompute every item's computed tags
    pub async fn set_tag_parents(&self, tag_id: i32, names: &[String]) -> AppResult<TagWithParents> {
        let tag = self.repository.tags.get_by_id(tag_id).await?;
        let parents: Vec<Tag> = self
            .repository
            .tags
            .get_or_create(names)
            .await?
            .into_iter()
            .filter(|p| p.id != tag.id)
            .collect();
        let parent_ids: Vec<i32> = parents.iter().map(|p| p.id).collect();
        self.repository.tags.set_parents(tag.id, &parent_ids).await?;

        let report = self.refresh_all_computed_tags().await?;
        tracing::info!(tag_id, items = report.items_refreshed, "Tag parents updated");

        Ok(TagWithParents {
            id: tag.id,
            name: tag.name,
            parents,
        })
    }

    async fn refresh_computed_tags(&self, item: &Item, edges: &[TagEdge]) -> AppResult<()> {
        let automatic = self
            .repository
            .tags
            .get_or_create(&tagging::automatic_tag_names(item))
            .await?;
        let mut seeds: Vec<i32> = self
            .repository
            .tags
            .base_tags(item.id)
            .await?
            .iter()
            .map(|t| t.id)
            .collect();
        seeds.extend(automatic.iter().map(|t| t.id));

        let computed: Vec<i32> = tagging::propagate(&seeds, edges).into_iter().collect();
        self.repository.tags.set_computed_tags(item.id, &computed).await
    }

    pub async fn refresh_all_computed_tags(&self) -> AppResult<TagRefreshReport> {
        let edges = self.repository.tags.edges().await?;
        let items = self.repository.items.all().await?;
        for item in &items {
            self.refresh_computed_tags(item, &edges).await?;
        }
        Ok(TagRefreshReport {
            items_refreshed: items.len(),
        })
    }

    // =========================================================================
    // LENDING
    // =========================================================================

    /// Lend items to a member on behalf of `gatekeeper_id`
    pub async fn borrow(&self, request: &BorrowRequest, gatekeeper_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let day = today();

        let member = self.repository.members.get_by_id(request.member_id).await?;
        let memberships = self.repository.members.memberships(member.id).await?;
        let assignments = self.repository.ranks.assignments_for_member(member.id).await?;
        let status = MemberStatus::compute(&member, &memberships, &assignments, day);
        if status.is_excluded {
            return Err(AppError::rule(BusinessRule::InvalidMembership, "Member is excluded from the club"));
        }
        if !status.has_valid_membership {
            return Err(AppError::rule(
                BusinessRule::InvalidMembership,
                "Member does not have a valid membership",
            ));
        }

        if request.due_date < day {
            return Err(AppError::Validation("due_date: must not be in the past".to_string()));
        }

        let item_ids = unique_ids(&request.item_ids);
        let records = self
            .repository
            .borrows
            .create_many(
                &item_ids,
                &NewBorrow {
                    member_id: member.id,
                    date_borrowed: day,
                    due_date: request.due_date,
                    gatekeeper_id,
                    member_address: request.member_address.trim(),
                    member_phone_number: request.member_phone_number.trim(),
                },
                |items, states| check_lending(&item_ids, items, states, day, request.due_date, &self.policy),
            )
            .await?;

        tracing::info!(
            member_id = member.id,
            gatekeeper_id,
            items = records.len(),
            due_date = %request.due_date,
            "Items borrowed"
        );
        Ok(records)
    }

    /// Mark records returned today by `gatekeeper_id`
    pub async fn return_items(&self, record_ids: &[i32], gatekeeper_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let records = self.repository.borrows.get_many(record_ids).await?;
        let found: HashSet<i32> = records.iter().map(|r| r.id).collect();
        if let Some(missing) = record_ids.iter().find(|id| !found.contains(id)) {
            return Err(AppError::NotFound(format!("Borrow record with id {} not found", missing)));
        }
        if let Some(returned) = records.iter().find(|r| r.date_returned.is_some()) {
            return Err(AppError::rule(
                BusinessRule::AlreadyReturned,
                format!("Borrow record {} was already returned", returned.id),
            ));
        }

        let updated = self
            .repository
            .borrows
            .mark_returned(record_ids, today(), gatekeeper_id)
            .await?;
        tracing::info!(gatekeeper_id, records = updated.len(), "Items returned");
        Ok(updated)
    }

    pub async fn verify_return(&self, record_id: i32) -> AppResult<BorrowRecord> {
        let record = self.repository.borrows.get_by_id(record_id).await?;
        if record.date_returned.is_none() {
            return Err(AppError::rule(
                BusinessRule::InvalidStatus,
                "Only returned items can be verified",
            ));
        }
        self.repository.borrows.verify_returned(record_id).await
    }

    pub async fn overdue(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        self.repository.borrows.overdue(today()).await
    }

    pub async fn member_records(&self, member_id: i32) -> AppResult<Vec<BorrowRecordDetails>> {
        self.repository.members.get_by_id(member_id).await?;
        self.repository.borrows.for_member(member_id).await
    }
}

/// Every requested item exists, is available and can stay out until `due_date`
pub fn check_lending(
    requested: &[i32],
    items: &[Item],
    states: &HashMap<i32, LendingState>,
    day: NaiveDate,
    due_date: NaiveDate,
    policy: &LibraryConfig,
) -> AppResult<()> {
    if items.len() != requested.len() {
        return Err(AppError::NotFound("One or more items do not exist".to_string()));
    }
    let empty = LendingState::default();
    for item in items {
        let state = states.get(&item.id).unwrap_or(&empty);
        let info = availability::compute(state, item.is_borrowable, day, policy);
        check_can_lend(item, &info, due_date)?;
    }
    Ok(())
}

/// Refuse if any of `items` is lent out or committed during `[start, end]`
pub fn check_window_free(
    items: &[Item],
    states: &HashMap<i32, LendingState>,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<()> {
    let empty = LendingState::default();
    let clashing: Vec<&str> = items
        .iter()
        .filter(|item| !availability::window_is_free(states.get(&item.id).unwrap_or(&empty), start, end))
        .map(|item| item.name.as_str())
        .collect();
    if clashing.is_empty() {
        return Ok(());
    }
    Err(AppError::rule(
        BusinessRule::ItemNotAvailable,
        format!("Already booked between {} and {}: {}", start, end, clashing.join(", ")),
    ))
}

/// An item may go out if it is available and the due date fits its window
fn check_can_lend(item: &Item, info: &AvailabilityInfo, due_date: NaiveDate) -> AppResult<()> {
    if !info.is_available {
        return Err(AppError::rule(
            BusinessRule::ItemNotAvailable,
            format!("{} is not available", item.name),
        ));
    }
    if let Some(max_due) = info.max_due_date {
        if due_date > max_due {
            return Err(AppError::rule(
                BusinessRule::ItemNotAvailable,
                format!("{} must be returned by {}", item.name, max_due),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::Commitment;
    use chrono::Utc;

    fn item() -> Item {
        Item {
            id: 4,
            name: "Gloomhaven".into(),
            slug: "gloomhaven".into(),
            description: String::new(),
            condition: String::new(),
            notes: String::new(),
            item_type: ItemType::BoardGame,
            image_url: None,
            is_borrowable: true,
            high_value: true,
            min_players: Some(1),
            max_players: Some(4),
            average_play_time: Some(120),
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    #[test]
    fn test_due_date_must_fit_window() {
        let info = AvailabilityInfo {
            in_clubroom: true,
            is_available: true,
            expected_availability_date: None,
            max_due_date: Some(day(10)),
        };
        assert!(check_can_lend(&item(), &info, day(10)).is_ok());
        let err = check_can_lend(&item(), &info, day(11)).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(BusinessRule::ItemNotAvailable, _)));
    }

    #[test]
    fn test_unavailable_item_refused() {
        let info = AvailabilityInfo {
            in_clubroom: false,
            is_available: false,
            expected_availability_date: Some(day(5)),
            max_due_date: None,
        };
        assert!(check_can_lend(&item(), &info, day(3)).is_err());
    }

    fn policy() -> LibraryConfig {
        LibraryConfig {
            max_loan_days: 14,
            min_loan_days: 3,
        }
    }

    #[test]
    fn test_open_loan_blocks_second_lending() {
        let mut states = HashMap::new();
        states.insert(4, LendingState::default());
        assert!(check_lending(&[4], &[item()], &states, day(1), day(5), &policy()).is_ok());

        // A gatekeeper who got the lock second sees the first loan
        states.get_mut(&4).unwrap().open_loans.push(day(5));
        let err = check_lending(&[4], &[item()], &states, day(1), day(5), &policy()).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(BusinessRule::ItemNotAvailable, _)));
    }

    #[test]
    fn test_missing_item_not_found() {
        let err = check_lending(&[4, 9], &[item()], &HashMap::new(), day(1), day(5), &policy()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_window_clash_names_items() {
        let mut states = HashMap::new();
        states.insert(
            4,
            LendingState {
                commitments: vec![Commitment { start: day(10), end: day(12) }],
                ..Default::default()
            },
        );
        assert!(check_window_free(&[item()], &states, day(1), day(9)).is_ok());

        let err = check_window_free(&[item()], &states, day(8), day(11)).unwrap_err();
        assert!(err.to_string().contains("Gloomhaven"));
    }
}
