//! Activity log entity: append-only narrative of settlement events.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Nullable so entries survive account removal (FK is ON DELETE SET NULL).
    #[sea_orm(column_type = "String(StringLen::N(64))", nullable)]
    pub account_id: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(512))")]
    pub message: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
