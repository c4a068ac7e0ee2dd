//! Task entity
//!
//! Table: mp_task

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Blocked,
    Done,
    Dropped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Dropped => "dropped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(TaskStatus::Todo),
            "doing" => Some(TaskStatus::Doing),
            "blocked" => Some(TaskStatus::Blocked),
            "done" => Some(TaskStatus::Done),
            "dropped" => Some(TaskStatus::Dropped),
            _ => None,
        }
    }
}

/// Lowest and highest accepted priority
pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;
pub const DEFAULT_PRIORITY: i32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_task")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub organization_id: i64,

    #[sea_orm(column_type = "String(Some(256))")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "String(Some(16))")]
    pub status: String,

    pub priority: i32,

    /// Person the task is assigned to
    #[sea_orm(nullable)]
    pub assignee_id: Option<i64>,

    /// Identity provider subject of the creator
    #[sea_orm(column_type = "String(Some(128))")]
    pub created_by_id: String,

    /// Due date (Unix timestamp)
    #[sea_orm(nullable)]
    pub due_date: Option<i64>,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Task response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: i32,
    #[serde(rename = "assigneeId")]
    pub assignee_id: Option<i64>,
    #[serde(rename = "createdById")]
    pub created_by_id: String,
    #[serde(rename = "dueDate")]
    pub due_date: Option<i64>,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl From<Model> for TaskResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            assignee_id: model.assignee_id,
            created_by_id: model.created_by_id,
            due_date: model.due_date,
            updated_at: model.updated_at,
        }
    }
}
