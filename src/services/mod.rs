//! Business logic services

pub mod accounts;
pub mod availability;
pub mod blog;
pub mod control_panel;
pub mod email;
pub mod external_forms;
pub mod jobs;
pub mod library;
pub mod members;
pub mod queue;
pub mod reservations;
pub mod tagging;
pub mod tokens;

use std::collections::HashSet;

use chrono::{Local, NaiveDate};

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// The club's calendar day
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `ids` without repeats, first occurrence wins
pub fn unique_ids(ids: &[i32]) -> Vec<i32> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub members: members::MembersService,
    pub accounts: accounts::AccountsService,
    pub library: library::LibraryService,
    pub external_forms: external_forms::ExternalFormsService,
    pub reservations: reservations::ReservationsService,
    pub blog: blog::BlogService,
    pub control_panel: control_panel::ControlPanelService,
    pub queue: queue::EmailQueue,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, queue: queue::EmailQueue) -> Self {
        let tokens = tokens::ActionTokens::new(&config.auth.jwt_secret);
        let library = library::LibraryService::new(repository.clone(), config.library.clone());

        Self {
            members: members::MembersService::new(
                repository.clone(),
                queue.clone(),
                tokens.clone(),
                config.site.clone(),
                config.auth.email_prefs_token_hours,
            ),
            accounts: accounts::AccountsService::new(
                repository.clone(),
                queue.clone(),
                tokens,
                config.auth.clone(),
                config.site.clone(),
            ),
            external_forms: external_forms::ExternalFormsService::new(repository.clone()),
            reservations: reservations::ReservationsService::new(repository.clone()),
            blog: blog::BlogService::new(repository.clone()),
            control_panel: control_panel::ControlPanelService::new(repository.clone()),
            library,
            queue,
            repository,
        }
    }

    /// Database and queue both answer
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await?;
        self.queue.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_keeps_first_occurrence() {
        assert_eq!(unique_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(unique_ids(&[]).is_empty());
    }
}
