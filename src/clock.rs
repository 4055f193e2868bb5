//! Canonical period boundaries used for counter rollover.
//!
//! A timestamp maps to exactly one day/week/month boundary in the service's
//! reference offset. Rollover decisions compare stored reset markers against
//! these boundaries; nothing here touches the database.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};

/// Start dates of the current day, ISO week (Monday) and calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBoundaries {
    pub day_start: NaiveDate,
    pub week_start: NaiveDate,
    pub month_start: NaiveDate,
}

/// Boundaries of `now` in UTC.
pub fn boundaries(now: DateTime<Utc>) -> PeriodBoundaries {
    boundaries_in(now, FixedOffset::east_opt(0).expect("zero offset is valid"))
}

/// Boundaries of `now` shifted into the reference offset first, so a
/// deployment pinned to e.g. UTC-5 rolls its day over at local midnight.
pub fn boundaries_in(now: DateTime<Utc>, offset: FixedOffset) -> PeriodBoundaries {
    let day_start = now.with_timezone(&offset).date_naive();
    let days_into_week = i64::from(day_start.weekday().num_days_from_monday());
    let week_start = day_start - Duration::days(days_into_week);
    let month_start = day_start
        .with_day(1)
        .expect("first of an existing month is always valid");

    assert!(week_start <= day_start, "Week start cannot follow the day");
    assert!(month_start <= day_start, "Month start cannot follow the day");
    PeriodBoundaries {
        day_start,
        week_start,
        month_start,
    }
}
