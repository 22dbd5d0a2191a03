//! History window planning.
//!
//! Given the configured averages, decide which dates to request from the
//! provider. Monthly averages need the newest month to be complete, so the
//! end date backs up to the previous month end unless today is the last day
//! of the month.

use crate::domain::MovingAverageSpec;
use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fixed lookback horizon in months (4 years).
pub const LOOKBACK_MONTHS: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub needs_month_alignment: bool,
}

/// Plan the range relative to `today` (UTC calendar date).
pub fn plan(moving_averages: &[MovingAverageSpec], today: NaiveDate) -> DateRange {
    let needs_month_alignment = moving_averages.iter().any(MovingAverageSpec::is_monthly);

    let end = if !needs_month_alignment {
        today.pred_opt().unwrap_or(today)
    } else if today.day() < days_in_month(today) {
        last_day_of_previous_month(today)
    } else {
        today
    };

    let start = end
        .checked_sub_months(Months::new(LOOKBACK_MONTHS))
        .unwrap_or(NaiveDate::MIN);

    DateRange {
        start,
        end,
        needs_month_alignment,
    }
}

/// Plan the range against the current UTC date.
pub fn plan_now(moving_averages: &[MovingAverageSpec]) -> DateRange {
    plan(moving_averages, Utc::now().date_naive())
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    match first.checked_add_months(Months::new(1)) {
        Some(next) => next.signed_duration_since(first).num_days() as u32,
        None => 31,
    }
}

fn last_day_of_previous_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}
