//! Pending transfer entity: an offered, not-yet-accepted token transfer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub recipient_id: String,
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub sender_id: String,
    /// Sender display name captured at enqueue time, decoupled from later renames.
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub sender_name: String,
    /// Strictly positive; validated before insert.
    pub amount: i64,
    #[sea_orm(column_type = "String(StringLen::N(512))", nullable)]
    pub note: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
