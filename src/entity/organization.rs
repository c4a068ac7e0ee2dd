//! Organization entity - tenant boundary
//!
//! Table: mp_organization

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_organization")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Display name
    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    /// URL slug (unique)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub slug: String,

    /// Creation time (Unix timestamp)
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
