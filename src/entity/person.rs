//! Person entity - org-chart node
//!
//! Table: mp_person
//!
//! `manager_id` is a self-referential edge. The manager graph is meant to be a
//! forest, but rows written before reassignment checks existed may still
//! contain cycles, so readers must not assume acyclicity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Person status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonStatus {
    Active,
    Inactive,
}

impl PersonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonStatus::Active => "active",
            PersonStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(PersonStatus::Active),
            "inactive" => Some(PersonStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_person")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub organization_id: i64,

    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub email: Option<String>,

    /// Job title
    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub role: Option<String>,

    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub team: Option<String>,

    /// active | inactive
    #[sea_orm(column_type = "String(Some(16))")]
    pub status: String,

    /// Direct manager (None for roots of the org chart)
    #[sea_orm(nullable)]
    pub manager_id: Option<i64>,

    /// Identity provider subject linked to this person
    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub user_id: Option<String>,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// Manager edges are walked by hand in `crate::hierarchy`

impl ActiveModelBehavior for ActiveModel {}

/// Person response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersonResponse {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub team: Option<String>,
    pub status: String,
    #[serde(rename = "managerId")]
    pub manager_id: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl From<Model> for PersonResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            team: model.team,
            status: model.status,
            manager_id: model.manager_id,
            user_id: model.user_id,
            updated_at: model.updated_at,
        }
    }
}
