//! Item availability from loans, hand-overs and upcoming commitments

use chrono::{Duration, NaiveDate};

use crate::{
    config::LibraryConfig,
    models::item::{AvailabilityInfo, Commitment, LendingState},
};

/// Work out whether an item can be borrowed on `today`, and until when.
pub fn compute(
    state: &LendingState,
    is_borrowable: bool,
    today: NaiveDate,
    policy: &LibraryConfig,
) -> AvailabilityInfo {
    let in_clubroom = state.open_loans.is_empty() && state.external_out.is_empty();

    if !is_borrowable {
        return AvailabilityInfo {
            in_clubroom,
            is_available: false,
            expected_availability_date: None,
            max_due_date: None,
        };
    }

    let mut available = in_clubroom;
    let mut expected = today;
    for due in state
        .open_loans
        .iter()
        .copied()
        .chain(state.external_out.iter().flatten().copied())
    {
        expected = expected.max(due);
    }

    let mut commitments: Vec<Commitment> = state
        .commitments
        .iter()
        .filter(|c| c.end >= today)
        .copied()
        .collect();
    commitments.sort_by_key(|c| (c.start, c.end));

    let min_loan = Duration::days(policy.min_loan_days);
    let mut next_start: Option<NaiveDate> = None;
    for commitment in &commitments {
        if commitment.start < expected + min_loan {
            available = false;
            expected = expected.max(commitment.end);
        } else {
            next_start = Some(commitment.start);
            break;
        }
    }

    if !available {
        return AvailabilityInfo {
            in_clubroom,
            is_available: false,
            expected_availability_date: Some(expected),
            max_due_date: None,
        };
    }

    let mut max_due = today + Duration::days(policy.max_loan_days);
    if let Some(start) = next_start {
        max_due = max_due.min(start - Duration::days(1));
    }

    AvailabilityInfo {
        in_clubroom,
        is_available: true,
        expected_availability_date: None,
        max_due_date: Some(max_due),
    }
}

/// Whether `[start, end]` clashes with a loan or commitment already on the item
pub fn window_is_free(state: &LendingState, start: NaiveDate, end: NaiveDate) -> bool {
    let loans_clear = state
        .open_loans
        .iter()
        .copied()
        .chain(state.external_out.iter().flatten().copied())
        .all(|due| due < start);
    let commitments_clear = state
        .commitments
        .iter()
        .all(|c| c.end < start || c.start > end);
    loans_clear && commitments_clear
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oct(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 10, d).unwrap()
    }

    fn policy() -> LibraryConfig {
        LibraryConfig {
            max_loan_days: 14,
            min_loan_days: 3,
        }
    }

    #[test]
    fn test_borrowed_item_expected_on_due_date() {
        let state = LendingState {
            open_loans: vec![oct(3)],
            ..Default::default()
        };

        for today in [oct(1), oct(3)] {
            let info = compute(&state, true, today, &policy());
            assert!(!info.in_clubroom);
            assert!(!info.is_available);
            assert_eq!(info.expected_availability_date, Some(oct(3)));
            assert_eq!(info.max_due_date, None);
        }
    }

    #[test]
    fn test_overdue_item_expected_today() {
        let state = LendingState {
            open_loans: vec![oct(3)],
            ..Default::default()
        };
        let info = compute(&state, true, oct(9), &policy());
        assert_eq!(info.expected_availability_date, Some(oct(9)));
    }

    #[test]
    fn test_returned_item_is_available() {
        let info = compute(&LendingState::default(), true, oct(3), &policy());
        assert!(info.in_clubroom);
        assert!(info.is_available);
        assert_eq!(info.expected_availability_date, None);
        assert_eq!(info.max_due_date, Some(oct(17)));
    }

    #[test]
    fn test_commitments_chain_expected_date() {
        let mut state = LendingState {
            commitments: vec![Commitment { start: oct(4), end: oct(5) }],
            ..Default::default()
        };
        let info = compute(&state, true, oct(3), &policy());
        assert!(info.in_clubroom);
        assert!(!info.is_available);
        assert_eq!(info.expected_availability_date, Some(oct(5)));

        state.commitments.push(Commitment { start: oct(6), end: oct(8) });
        let info = compute(&state, true, oct(3), &policy());
        assert!(!info.is_available);
        assert_eq!(info.expected_availability_date, Some(oct(8)));
    }

    #[test]
    fn test_distant_commitment_caps_max_due_date() {
        let state = LendingState {
            commitments: vec![Commitment { start: oct(10), end: oct(12) }],
            ..Default::default()
        };
        let info = compute(&state, true, oct(1), &policy());
        assert!(info.is_available);
        assert_eq!(info.max_due_date, Some(oct(9)));
    }

    #[test]
    fn test_finished_commitments_ignored() {
        let state = LendingState {
            commitments: vec![Commitment { start: oct(1), end: oct(2) }],
            ..Default::default()
        };
        assert!(compute(&state, true, oct(3), &policy()).is_available);
    }

    #[test]
    fn test_not_borrowable() {
        let info = compute(&LendingState::default(), false, oct(1), &policy());
        assert!(info.in_clubroom);
        assert!(!info.is_available);
        assert_eq!(info.expected_availability_date, None);
        assert_eq!(info.max_due_date, None);
    }

    #[test]
    fn test_external_hand_over_takes_item_out() {
        let state = LendingState {
            external_out: vec![Some(oct(7))],
            ..Default::default()
        };
        let info = compute(&state, true, oct(2), &policy());
        assert!(!info.in_clubroom);
        assert_eq!(info.expected_availability_date, Some(oct(7)));
    }

    #[test]
    fn test_window_is_free() {
        let state = LendingState {
            open_loans: vec![oct(3)],
            commitments: vec![Commitment { start: oct(10), end: oct(12) }],
            ..Default::default()
        };
        assert!(window_is_free(&state, oct(4), oct(9)));
        assert!(!window_is_free(&state, oct(3), oct(5)));
        assert!(!window_is_free(&state, oct(12), oct(14)));
        assert!(window_is_free(&state, oct(13), oct(14)));
    }
}
