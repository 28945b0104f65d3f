//! Item reservations

use crate::{
    error::{AppError, AppResult, BusinessRule},
    models::{
        account::SessionClaims,
        enums::ApprovalStatus,
        reservation::{CreateReservation, Reservation, ReservationDetails},
    },
    repository::Repository,
};

use super::{library::check_window_free, today, unique_ids};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
}

impl ReservationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Anonymous callers make external reservations, signed-in callers internal ones
    pub async fn submit(&self, data: &CreateReservation, caller: Option<&SessionClaims>) -> AppResult<ReservationDetails> {
        if data.date_to_borrow < today() {
            return Err(AppError::Validation("date_to_borrow: must not be in the past".to_string()));
        }
        if data.date_to_return < data.date_to_borrow {
            return Err(AppError::Validation(
                "date_to_return: must not be before date_to_borrow".to_string(),
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

        let member_id = caller.map(|c| c.member_id);
        let details = self.repository.reservations.create(data, &item_ids, member_id).await?;
        tracing::info!(
            reservation_id = details.reservation.id,
            internal = member_id.is_some(),
            "Reservation submitted"
        );
        Ok(details)
    }

    pub async fn list(&self, status: Option<ApprovalStatus>) -> AppResult<Vec<Reservation>> {
        self.repository.reservations.list(status).await
    }

    pub async fn get(&self, id: i32) -> AppResult<ReservationDetails> {
        self.repository.reservations.get(id).await
    }

    /// Approve if every reserved item is free over the whole window
    pub async fn approve(&self, id: i32, comments: Option<&str>) -> AppResult<ReservationDetails> {
        let reservation = self.repository.reservations.get_reservation(id).await?;
        require_status(&reservation, ApprovalStatus::Pending, "approved")?;

        let (start, end) = (reservation.date_to_borrow, reservation.date_to_return);
        self.repository
            .reservations
            .approve(id, comments, today(), |items, states| {
                check_window_free(items, states, start, end)
            })
            .await?;
        tracing::info!(reservation_id = id, "Reservation approved");
        self.get(id).await
    }

    pub async fn deny(&self, id: i32, comments: Option<&str>) -> AppResult<ReservationDetails> {
        let reservation = self.repository.reservations.get_reservation(id).await?;
        require_status(&reservation, ApprovalStatus::Pending, "denied")?;

        self.repository
            .reservations
            .transition(id, ApprovalStatus::Pending, ApprovalStatus::Denied, comments)
            .await?;
        tracing::info!(reservation_id = id, "Reservation denied");
        self.get(id).await
    }

    /// Attach the borrow records created when the items were handed over
    pub async fn activate(&self, id: i32, borrow_record_ids: &[i32]) -> AppResult<ReservationDetails> {
        let reservation = self.repository.reservations.get_reservation(id).await?;
        require_status(&reservation, ApprovalStatus::Approved, "activated")?;

        let records = self.repository.borrows.get_many(borrow_record_ids).await?;
        if records.len() != borrow_record_ids.len() {
            return Err(AppError::NotFound("One or more borrow records do not exist".to_string()));
        }

        self.repository.reservations.activate(id, borrow_record_ids).await
    }

    pub async fn complete(&self, id: i32) -> AppResult<ReservationDetails> {
        let reservation = self.repository.reservations.get_reservation(id).await?;
        require_status(&reservation, ApprovalStatus::Approved, "completed")?;

        self.repository
            .reservations
            .transition(id, ApprovalStatus::Approved, ApprovalStatus::Completed, None)
            .await?;
        tracing::info!(reservation_id = id, "Reservation completed");
        self.get(id).await
    }
}

fn require_status(reservation: &Reservation, expected: ApprovalStatus, action: &str) -> AppResult<()> {
    if reservation.approval_status != expected {
        return Err(AppError::rule(
            BusinessRule::InvalidStatus,
            format!(
                "Reservation {} cannot be {} in status {}",
                reservation.id, action, reservation.approval_status
            ),
        ));
    }
    Ok(())
}
