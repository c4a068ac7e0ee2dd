//! Notification entity
//!
//! Table: mp_notification

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification kinds
pub mod kind {
    pub const TASK_ASSIGNED: &str = "task_assigned";
    pub const FEEDBACK_RECEIVED: &str = "feedback_received";
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_notification")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub organization_id: i64,

    /// Recipient (identity provider subject)
    #[sea_orm(column_type = "String(Some(128))")]
    pub user_id: String,

    #[sea_orm(column_type = "String(Some(32))")]
    pub kind: String,

    #[sea_orm(column_type = "String(Some(256))")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    pub read: bool,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
