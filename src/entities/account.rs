//! Account entity: per-user all-time and period token counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Stable external user identifier supplied by the caller.
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(64))")]
    pub user_id: String,
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub display_name: String,
    /// Optional product/offering label, display only.
    #[sea_orm(column_type = "String(StringLen::N(64))", nullable)]
    pub product: Option<String>,
    /// Monotonic totals, never reset.
    pub all_time_received: i64,
    pub all_time_given: i64,
    /// Period counters, zeroed lazily when their boundary advances.
    pub daily_received: i64,
    pub daily_given: i64,
    pub weekly_received: i64,
    pub weekly_given: i64,
    pub monthly_received: i64,
    pub monthly_given: i64,
    /// Period-start date as of the last reset; absent until the first reset.
    pub last_daily_reset: Option<Date>,
    pub last_weekly_reset: Option<Date>,
    pub last_monthly_reset: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    /// Refreshed by every write path; doubles as the optimistic update guard.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
