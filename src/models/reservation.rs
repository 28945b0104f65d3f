//! Item reservations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::ApprovalStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub is_external: bool,
    pub internal_member_id: Option<i32>,
    pub borrower_name: String,
    pub contact_email: String,
    pub contact_info: String,
    pub date_to_borrow: NaiveDate,
    pub date_to_return: NaiveDate,
    pub additional_details: String,
    pub submitted_datetime: DateTime<Utc>,
    pub approval_status: ApprovalStatus,
    pub status_update_datetime: Option<DateTime<Utc>>,
    pub librarian_comments: String,
    /// Items have been handed over
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub reserved_item_ids: Vec<i32>,
    pub borrow_record_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservation {
    #[validate(length(min = 1, max = 200, message = "Borrower name is required"))]
    pub borrower_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: String,
    #[validate(length(min = 1, message = "Contact info is required"))]
    pub contact_info: String,
    pub date_to_borrow: NaiveDate,
    pub date_to_return: NaiveDate,
    pub additional_details: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub item_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReservationDecision {
    pub librarian_comments: Option<String>,
}

/// Link borrow records to an approved internal reservation
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivateReservation {
    pub borrow_record_ids: Vec<i32>,
}
