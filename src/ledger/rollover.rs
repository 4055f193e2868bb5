//! Lazy period rollover.
//!
//! There is no scheduler: counters are zeroed on first access after a period
//! boundary advances. Each of the three periods is checked independently, so
//! a day rollover never implies a week or month rollover.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, UpdateMany};

use crate::clock::{self, PeriodBoundaries};
use crate::entities::account;

use super::{LedgerError, Side};

/// Which period counters must be zeroed before the account is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RolloverPlan {
    pub daily: bool,
    pub weekly: bool,
    pub monthly: bool,
}

impl RolloverPlan {
    pub fn is_noop(&self) -> bool {
        !(self.daily || self.weekly || self.monthly)
    }
}

/// A period is stale when its marker is absent or strictly earlier than the
/// current boundary. Pure; evaluating it twice with the same inputs yields
/// the same plan.
pub fn plan(account: &account::Model, boundaries: PeriodBoundaries) -> RolloverPlan {
    RolloverPlan {
        daily: is_stale(account.last_daily_reset, boundaries.day_start),
        weekly: is_stale(account.last_weekly_reset, boundaries.week_start),
        monthly: is_stale(account.last_monthly_reset, boundaries.month_start),
    }
}

fn is_stale(marker: Option<NaiveDate>, boundary: NaiveDate) -> bool {
    match marker {
        None => true,
        Some(date) => date < boundary,
    }
}

/// Apply a plan to an in-memory snapshot: zero both counters of each stale
/// period and advance its marker. Used to shape fresh snapshots and to mask
/// stale counters in read-only views.
pub fn apply(
    mut account: account::Model,
    plan: RolloverPlan,
    boundaries: PeriodBoundaries,
) -> account::Model {
    if plan.daily {
        account.daily_received = 0;
        account.daily_given = 0;
        account.last_daily_reset = Some(boundaries.day_start);
    }
    if plan.weekly {
        account.weekly_received = 0;
        account.weekly_given = 0;
        account.last_weekly_reset = Some(boundaries.week_start);
    }
    if plan.monthly {
        account.monthly_received = 0;
        account.monthly_given = 0;
        account.last_monthly_reset = Some(boundaries.month_start);
    }
    account
}

/// Load the account and persist any due rollover, returning the fresh
/// snapshot. Must run before any operation that reads or writes period
/// counters. Idempotent for a fixed `now`: the second invocation plans a
/// no-op and writes nothing.
pub async fn ensure_current<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<account::Model, LedgerError> {
    let account = account::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))?;

    let boundaries = clock::boundaries_in(now, offset);
    let due = plan(&account, boundaries);
    if due.is_noop() {
        return Ok(account);
    }

    let stamp = now.fixed_offset();
    let update = build_update(&account, due, boundaries, None, stamp);
    commit_update(db, &account, update).await?;

    let mut fresh = apply(account, due, boundaries);
    fresh.updated_at = stamp;
    Ok(fresh)
}

/// Build the single guarded UPDATE that zeroes stale periods, advances their
/// markers, optionally credits one side of the ledger, and refreshes
/// `updated_at`. The filter on the previously read `updated_at` is the
/// optimistic lock: zero rows affected means another writer got there first.
pub(crate) fn build_update(
    account: &account::Model,
    plan: RolloverPlan,
    boundaries: PeriodBoundaries,
    credit: Option<(Side, i64)>,
    stamp: sea_orm::prelude::DateTimeWithTimeZone,
) -> UpdateMany<account::Entity> {
    use account::Column;

    let mut update =
        account::Entity::update_many().col_expr(Column::UpdatedAt, Expr::value(stamp));

    if let Some((side, amount)) = credit {
        let all_time = match side {
            Side::Received => Column::AllTimeReceived,
            Side::Given => Column::AllTimeGiven,
        };
        update = update.col_expr(all_time, Expr::col(all_time).add(amount));
    }

    update = period_exprs(
        update,
        plan.daily,
        Column::DailyReceived,
        Column::DailyGiven,
        Column::LastDailyReset,
        boundaries.day_start,
        credit,
    );
    update = period_exprs(
        update,
        plan.weekly,
        Column::WeeklyReceived,
        Column::WeeklyGiven,
        Column::LastWeeklyReset,
        boundaries.week_start,
        credit,
    );
    update = period_exprs(
        update,
        plan.monthly,
        Column::MonthlyReceived,
        Column::MonthlyGiven,
        Column::LastMonthlyReset,
        boundaries.month_start,
        credit,
    );

    update
        .filter(Column::UserId.eq(account.user_id.clone()))
        .filter(Column::UpdatedAt.eq(account.updated_at))
}

fn period_exprs(
    update: UpdateMany<account::Entity>,
    rolled: bool,
    received_col: account::Column,
    given_col: account::Column,
    marker_col: account::Column,
    boundary: NaiveDate,
    credit: Option<(Side, i64)>,
) -> UpdateMany<account::Entity> {
    if rolled {
        // The period restarts from the credit alone. Each column is assigned
        // exactly once; SQL forbids repeated assignments in one UPDATE.
        let (received_value, given_value) = match credit {
            Some((Side::Received, amount)) => (amount, 0),
            Some((Side::Given, amount)) => (0, amount),
            None => (0, 0),
        };
        update
            .col_expr(received_col, Expr::value(received_value))
            .col_expr(given_col, Expr::value(given_value))
            .col_expr(marker_col, Expr::value(boundary))
    } else {
        match credit {
            Some((Side::Received, amount)) => {
                update.col_expr(received_col, Expr::col(received_col).add(amount))
            }
            Some((Side::Given, amount)) => {
                update.col_expr(given_col, Expr::col(given_col).add(amount))
            }
            None => update,
        }
    }
}

pub(crate) async fn commit_update<C: ConnectionTrait>(
    db: &C,
    account: &account::Model,
    update: UpdateMany<account::Entity>,
) -> Result<(), LedgerError> {
    let result = update.exec(db).await?;
    if result.rows_affected == 0 {
        return Err(LedgerError::ConcurrencyConflict(account.user_id.clone()));
    }
    assert!(
        result.rows_affected == 1,
        "Account primary key must be unique"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn fresh_account_is_stale_in_all_periods() {
        let boundaries = clock::boundaries(testing::moment());
        let account = blank_account();
        let due = plan(&account, boundaries);
        assert!(due.daily && due.weekly && due.monthly);
    }

    #[test]
    fn periods_roll_independently() {
        // Markers current for week and month, one day behind for daily.
        let now = testing::moment();
        let boundaries = clock::boundaries(now);
        let mut account = blank_account();
        account.last_daily_reset = Some(boundaries.day_start - Duration::days(1));
        account.last_weekly_reset = Some(boundaries.week_start);
        account.last_monthly_reset = Some(boundaries.month_start);

        let due = plan(&account, boundaries);
        assert!(due.daily);
        assert!(!due.weekly);
        assert!(!due.monthly);
    }

    #[test]
    fn apply_zeroes_only_stale_periods() {
        let boundaries = clock::boundaries(testing::moment());
        let mut account = blank_account();
        account.daily_received = 7;
        account.daily_given = 3;
        account.weekly_received = 20;
        account.monthly_received = 40;

        let due = RolloverPlan {
            daily: true,
            weekly: false,
            monthly: false,
        };
        let fresh = apply(account, due, boundaries);
        assert_eq!(fresh.daily_received, 0);
        assert_eq!(fresh.daily_given, 0);
        assert_eq!(fresh.last_daily_reset, Some(boundaries.day_start));
        assert_eq!(fresh.weekly_received, 20);
        assert_eq!(fresh.monthly_received, 40);
        assert_eq!(fresh.last_weekly_reset, None);
    }

    #[tokio::test]
    async fn ensure_current_persists_once_and_is_idempotent() {
        let db = testing::database().await;
        testing::seed_account(&db, "u_alice", "Alice").await;
        let now = testing::moment();

        let first = ensure_current(&db, "u_alice", now, testing::utc())
            .await
            .expect("rollover succeeds");
        let boundaries = clock::boundaries(now);
        assert_eq!(first.last_daily_reset, Some(boundaries.day_start));
        assert_eq!(first.last_weekly_reset, Some(boundaries.week_start));
        assert_eq!(first.last_monthly_reset, Some(boundaries.month_start));

        let stored = testing::fetch_account(&db, "u_alice").await;
        assert_eq!(stored.last_daily_reset, first.last_daily_reset);

        // Same `now` again: no further change.
        let second = ensure_current(&db, "u_alice", now, testing::utc())
            .await
            .expect("second rollover succeeds");
        assert_eq!(second, stored);
    }

    #[tokio::test]
    async fn day_advance_resets_daily_counters_only() {
        let db = testing::database().await;
        testing::seed_account(&db, "u_bob", "Bob").await;

        // Wednesday: settle some state so every marker lands mid-week.
        let wednesday = Utc.with_ymd_and_hms(2026, 8, 19, 9, 0, 0).unwrap();
        ensure_current(&db, "u_bob", wednesday, testing::utc())
            .await
            .expect("initial rollover");
        crate::ledger::settlement::testing_credit(&db, "u_bob", 5, wednesday, testing::utc())
            .await
            .expect("credit applies");

        // Thursday, same week and month.
        let thursday = testing::moment();
        let fresh = ensure_current(&db, "u_bob", thursday, testing::utc())
            .await
            .expect("daily rollover");
        assert_eq!(fresh.daily_received, 0);
        assert_eq!(fresh.weekly_received, 5);
        assert_eq!(fresh.monthly_received, 5);
        assert_eq!(fresh.all_time_received, 5);
        let boundaries = clock::boundaries(thursday);
        assert_eq!(fresh.last_daily_reset, Some(boundaries.day_start));
        assert_eq!(fresh.last_weekly_reset, Some(boundaries.week_start));
    }

    #[tokio::test]
    async fn unknown_account_is_signalled() {
        let db = testing::database().await;
        let err = ensure_current(&db, "u_ghost", testing::moment(), testing::utc())
            .await
            .expect_err("missing account must fail");
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
    }

    fn blank_account() -> account::Model {
        let stamp = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .unwrap()
            .fixed_offset();
        account::Model {
            user_id: "u_blank".to_string(),
            display_name: "Blank".to_string(),
            product: None,
            all_time_received: 0,
            all_time_given: 0,
            daily_received: 0,
            daily_given: 0,
            weekly_received: 0,
            weekly_given: 0,
            monthly_received: 0,
            monthly_given: 0,
            last_daily_reset: None,
            last_weekly_reset: None,
            last_monthly_reset: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }
}
