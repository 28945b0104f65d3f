//! Library item model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::ItemType;
use super::tag::Tag;

/// Club-owned item
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub condition: String,
    pub notes: String,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    pub is_borrowable: bool,
    /// Expensive or fragile items, flagged to gatekeepers
    pub high_value: bool,
    pub min_players: Option<i32>,
    pub max_players: Option<i32>,
    /// Minutes
    pub average_play_time: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Public JSON shape used by the random-item API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemSummary {
    pub id: i32,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub is_borrowable: bool,
    pub image: Option<String>,
}

impl From<Item> for ItemSummary {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            item_type: item.item_type,
            is_borrowable: item.is_borrowable,
            image: item.image_url,
        }
    }
}

/// Whether and when an item can be borrowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityInfo {
    /// Physically in the clubroom right now
    pub in_clubroom: bool,
    /// Can be borrowed today
    pub is_available: bool,
    /// When the item is next expected to be free, if it is not now
    pub expected_availability_date: Option<NaiveDate>,
    /// Latest due date for a loan starting today, if available
    pub max_due_date: Option<NaiveDate>,
}

/// Item list row
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemListEntry {
    #[serde(flatten)]
    pub item: Item,
    pub availability: AvailabilityInfo,
}

/// Item with tags and availability
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemDetails {
    #[serde(flatten)]
    pub item: Item,
    pub base_tags: Vec<Tag>,
    pub computed_tags: Vec<Tag>,
    pub availability: AvailabilityInfo,
}

/// Item query parameters
#[derive(Debug, Deserialize, Validate, IntoParams, ToSchema)]
pub struct ItemQuery {
    pub item_type: Option<ItemType>,
    /// Computed tag name
    pub tag: Option<String>,
    /// Search in item name
    pub name: Option<String>,
    #[validate(range(min = 1, max = 1_000_000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 200, message = "Page size must be between 1 and 200"))]
    pub per_page: Option<i64>,
}

/// Create item request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    /// Derived from the name when omitted
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub item_type: ItemType,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
    pub is_borrowable: Option<bool>,
    pub high_value: Option<bool>,
    #[validate(range(min = 1, max = 100))]
    pub min_players: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub max_players: Option<i32>,
    #[validate(range(min = 1))]
    pub average_play_time: Option<i32>,
    /// Base tag names
    pub tags: Option<Vec<String>>,
}

/// Update item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateItem {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub item_type: Option<ItemType>,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
    pub is_borrowable: Option<bool>,
    pub high_value: Option<bool>,
    #[validate(range(min = 1, max = 100))]
    pub min_players: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub max_players: Option<i32>,
    #[validate(range(min = 1))]
    pub average_play_time: Option<i32>,
}

pub(crate) fn check_player_range(min: Option<i32>, max: Option<i32>) -> Result<(), crate::error::AppError> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(crate::error::AppError::Validation(
                "min_players: must not exceed max_players".to_string(),
            ));
        }
    }
    Ok(())
}

/// A window in which an approved form or reservation holds an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Everything that decides whether one item can be lent out
#[derive(Debug, Clone, Default)]
pub struct LendingState {
    /// Due dates of unreturned internal borrow records
    pub open_loans: Vec<NaiveDate>,
    /// Form due dates of external item records handed over and not returned
    pub external_out: Vec<Option<NaiveDate>>,
    /// Approved forms and reservations that have not ended
    pub commitments: Vec<Commitment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<i64>, per_page: Option<i64>) -> ItemQuery {
        ItemQuery { item_type: None, tag: None, name: None, page, per_page }
    }

    #[test]
    fn test_query_page_bounds() {
        assert!(query(None, None).validate().is_ok());
        assert!(query(Some(3), Some(200)).validate().is_ok());
        assert!(query(Some(0), None).validate().is_err());
        assert!(query(Some(i64::MAX), None).validate().is_err());
        assert!(query(Some(1), Some(201)).validate().is_err());
    }
}
