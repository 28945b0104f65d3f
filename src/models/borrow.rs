//! Internal borrow records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// A member borrowing one item
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub borrowing_member_id: i32,
    pub item_id: i32,
    pub date_borrowed: NaiveDate,
    pub due_date: NaiveDate,
    pub auth_gatekeeper_borrow_id: Option<i32>,
    pub auth_gatekeeper_return_id: Option<i32>,
    pub date_returned: Option<NaiveDate>,
    pub member_address: String,
    pub member_phone_number: String,
    /// Librarian has checked the item back on the shelf
    pub verified_returned: bool,
}

impl BorrowRecord {
    pub fn is_overdue_on(&self, day: NaiveDate) -> bool {
        self.date_returned.is_none() && self.due_date < day
    }
}

/// Borrow record joined with item and member names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecordDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub item_name: String,
    pub member_name: String,
    pub member_email: String,
}

/// Gatekeeper lending items to a member
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    pub member_id: i32,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub item_ids: Vec<i32>,
    pub due_date: NaiveDate,
    #[validate(length(min = 1, max = 500, message = "Address is required"))]
    pub member_address: String,
    #[validate(length(min = 6, max = 20, message = "Phone number must be 6-20 characters"))]
    pub member_phone_number: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReturnRequest {
    #[validate(length(min = 1, message = "At least one record is required"))]
    pub record_ids: Vec<i32>,
}
