//! External borrowing forms

use crate::{
    error::{AppError, AppResult, BusinessRule},
    models::{
        enums::FormStatus,
        external::{ApproveExternalForm, CreateExternalForm, ExternalBorrowingForm, ExternalFormDetails, ExternalItemsAction},
    },
    repository::Repository,
};

use super::{library::check_window_free, today, unique_ids};

#[derive(Clone)]
pub struct ExternalFormsService {
    repository: Repository,
}

impl ExternalFormsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn submit(&self, data: &CreateExternalForm) -> AppResult<ExternalFormDetails> {
        let day = today();
        if data.requested_borrow_date < day {
            return Err(AppError::Validation(
                "requested_borrow_date: must not be in the past".to_string(),
            ));
        }
        let item_ids = unique_ids(&data.item_ids);
        let items = self.repository.items.get_many(&item_ids).await?;
        if items.len() != item_ids.len() {
            return Err(AppError::NotFound("One or more items do not exist".to_string()));
        }
        if let Some(item) = items.iter().find(|i| !i.is_borrowable) {
            return Err(AppError::rule(
                BusinessRule::ItemNotAvailable,
                format!("{} cannot be borrowed", item.name),
            ));
        }

        let details = self.repository.external_forms.create(data, &item_ids, day).await?;
        tracing::info!(form_id = details.form.id, items = details.requested_items.len(), "External borrowing form submitted");
        Ok(details)
    }

    pub async fn list(&self, status: Option<FormStatus>) -> AppResult<Vec<ExternalBorrowingForm>> {
        self.repository.external_forms.list(status).await
    }

    pub async fn get(&self, id: i32) -> AppResult<ExternalFormDetails> {
        self.repository.external_forms.get(id).await
    }

    pub async fn approve(&self, id: i32, data: &ApproveExternalForm) -> AppResult<ExternalFormDetails> {
        let form = self.repository.external_forms.get_form(id).await?;
        require_status(&form, FormStatus::Unapproved, "approved")?;
        if data.due_date < form.requested_borrow_date {
            return Err(AppError::Validation(
                "due_date: must not be before the requested borrow date".to_string(),
            ));
        }
        let (start, end) = (form.requested_borrow_date, data.due_date);
        self.repository
            .external_forms
            .approve(
                id,
                data.due_date,
                data.librarian_comments.as_deref().unwrap_or(""),
                today(),
                |items, states| check_window_free(items, states, start, end),
            )
            .await?;
        tracing::info!(form_id = id, due_date = %data.due_date, "External borrowing form approved");
        self.get(id).await
    }

    pub async fn deny(&self, id: i32, comments: Option<&str>) -> AppResult<ExternalFormDetails> {
        let form = self.repository.external_forms.get_form(id).await?;
        require_status(&form, FormStatus::Unapproved, "denied")?;

        self.repository
            .external_forms
            .deny(id, comments.unwrap_or(""))
            .await?;
        tracing::info!(form_id = id, "External borrowing form denied");
        self.get(id).await
    }

    /// Hand over items of an approved form
    pub async fn mark_borrowed(&self, id: i32, action: &ExternalItemsAction, gatekeeper_id: i32) -> AppResult<ExternalFormDetails> {
        let form = self.repository.external_forms.get_form(id).await?;
        require_status(&form, FormStatus::Approved, "handed over")?;

        let updated = self
            .repository
            .external_forms
            .mark_borrowed(id, &action.record_ids, today(), gatekeeper_id, action.person_name.trim())
            .await?;
        if updated as usize != action.record_ids.len() {
            tracing::warn!(form_id = id, requested = action.record_ids.len(), updated, "Some item records were already out or not on this form");
        }
        self.get(id).await
    }

    /// Take back items; the form completes once everything is back
    pub async fn mark_returned(&self, id: i32, action: &ExternalItemsAction, gatekeeper_id: i32) -> AppResult<ExternalFormDetails> {
        let form = self.repository.external_forms.get_form(id).await?;
        require_status(&form, FormStatus::Approved, "returned")?;

        let updated = self
            .repository
            .external_forms
            .mark_returned(id, &action.record_ids, today(), gatekeeper_id, action.person_name.trim())
            .await?;
        if updated == 0 {
            return Err(AppError::rule(
                BusinessRule::AlreadyReturned,
                "None of these item records are out",
            ));
        }

        let records = self.repository.external_forms.item_records(id).await?;
        if records.iter().all(|r| r.date_returned.is_some()) {
            self.repository
                .external_forms
                .set_status(id, FormStatus::Completed)
                .await?;
            tracing::info!(form_id = id, "External borrowing form completed");
        }
        self.get(id).await
    }
}

fn require_status(form: &ExternalBorrowingForm, expected: FormStatus, action: &str) -> AppResult<()> {
    if form.form_status != expected {
        return Err(AppError::rule(
            BusinessRule::InvalidStatus,
            format!("Form {} cannot be {} in status {}", form.id, action, form.form_status),
        ));
    }
    Ok(())
}
