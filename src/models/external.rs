//! External borrowing forms (other clubs and organisations borrowing items)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::FormStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ExternalBorrowingForm {
    pub id: i32,
    pub applicant_name: String,
    pub applicant_org: String,
    pub event_details: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub requested_borrow_date: NaiveDate,
    /// Set by the librarian on approval
    pub due_date: Option<NaiveDate>,
    pub form_status: FormStatus,
    pub form_submitted_date: NaiveDate,
    pub librarian_comments: String,
}

/// One requested item on a form, tracking its hand-over and return
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ExternalBorrowingItemRecord {
    pub id: i32,
    pub form_id: i32,
    pub item_id: i32,
    pub date_borrowed: Option<NaiveDate>,
    pub auth_gatekeeper_borrow_id: Option<i32>,
    pub borrower_name: String,
    pub date_returned: Option<NaiveDate>,
    pub auth_gatekeeper_return_id: Option<i32>,
    pub returner_name: String,
}

impl ExternalBorrowingItemRecord {
    /// Handed over on or before `day` and not yet back
    pub fn is_out_on(&self, day: NaiveDate) -> bool {
        matches!(self.date_borrowed, Some(d) if d <= day) && self.date_returned.is_none()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExternalFormDetails {
    #[serde(flatten)]
    pub form: ExternalBorrowingForm,
    pub requested_items: Vec<ExternalBorrowingItemRecord>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateExternalForm {
    #[validate(length(min = 1, max = 200, message = "Applicant name is required"))]
    pub applicant_name: String,
    #[validate(length(max = 200))]
    pub applicant_org: Option<String>,
    #[validate(length(min = 1, message = "Event details are required"))]
    pub event_details: String,
    #[validate(length(min = 6, max = 20, message = "Phone number must be 6-20 characters"))]
    pub contact_phone: String,
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: String,
    pub requested_borrow_date: NaiveDate,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub item_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveExternalForm {
    pub due_date: NaiveDate,
    pub librarian_comments: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DenyRequest {
    pub librarian_comments: Option<String>,
}

/// Hand over or take back items on a form
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExternalItemsAction {
    #[validate(length(min = 1, message = "At least one item record is required"))]
    pub record_ids: Vec<i32>,
    /// Person collecting or returning the items
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub person_name: String,
}
