//! OpLog entity - audit trail of org-chart and access mutations
//!
//! Table: mp_op_log

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    CreatePerson,
    UpdatePerson,
    ReassignManager,
    DeletePerson,
    CreateTask,
    UpdateTaskStatus,
    LeaveFeedback,
    AccessDenied,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::CreatePerson => "create_person",
            OpType::UpdatePerson => "update_person",
            OpType::ReassignManager => "reassign_manager",
            OpType::DeletePerson => "delete_person",
            OpType::CreateTask => "create_task",
            OpType::UpdateTaskStatus => "update_task_status",
            OpType::LeaveFeedback => "leave_feedback",
            OpType::AccessDenied => "access_denied",
        }
    }
}

/// Operation result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult {
    Success,
    Failed,
}

impl OpResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpResult::Success => "success",
            OpResult::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mp_op_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub organization_id: i64,

    /// Operation time (Unix timestamp)
    pub op_time: i64,

    /// Acting user (identity provider subject)
    #[sea_orm(column_type = "String(Some(128))")]
    pub user_id: String,

    #[sea_orm(column_type = "String(Some(32))")]
    pub op_type: String,

    #[sea_orm(column_type = "Text")]
    pub op_desc: String,

    /// Value before the change, if any
    #[sea_orm(column_type = "Text", nullable)]
    pub old_value: Option<String>,

    #[sea_orm(column_type = "String(Some(16))")]
    pub result: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
