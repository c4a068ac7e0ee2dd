//! Feedback entity
//!
//! Table: mp_feedback

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Feedback kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Praise,
    Concern,
    Note,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Praise => "praise",
            FeedbackKind::Concern => "concern",
            FeedbackKind::Note => "note",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_feedback")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub organization_id: i64,

    /// Person the feedback is about
    pub about_person_id: i64,

    /// Author (identity provider subject)
    #[sea_orm(column_type = "String(Some(128))")]
    pub from_user_id: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub kind: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Hidden from the subject; visible to the author and the subject's managers
    pub is_private: bool,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
