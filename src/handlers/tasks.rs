//! Task handlers
//!
//! Every listing and mutation goes through the task access condition.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

use crate::access::visible_tasks_condition;
use crate::entity::op_log::OpType;
use crate::entity::task::{self, TaskResponse, TaskStatus, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};
use crate::entity::notification;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::{log_denied, log_operation};
use crate::handlers::notifications::notify;
use crate::handlers::now_ts;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

const MAX_TITLE_CHARS: usize = 256;

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
    #[serde(rename = "assigneeId")]
    pub assignee_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i32>,
    #[serde(rename = "assigneeId")]
    pub assignee_id: Option<i64>,
    #[serde(rename = "dueDate")]
    pub due_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

fn parse_status(value: &str) -> AppResult<TaskStatus> {
    TaskStatus::parse(value).ok_or_else(|| AppError::Validation(format!("unknown status: {}", value)))
}

fn validate_task(req: &CreateTaskRequest) -> AppResult<(String, i32)> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "title must not exceed {} characters",
            MAX_TITLE_CHARS
        )));
    }
    let priority = req.priority.unwrap_or(DEFAULT_PRIORITY);
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(AppError::Validation(format!(
            "priority must be between {} and {}",
            MIN_PRIORITY, MAX_PRIORITY
        )));
    }
    Ok((title.to_string(), priority))
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<ApiResponse<Vec<TaskResponse>>>> {
    let directory = state.directory(user.organization_id);
    let condition =
        visible_tasks_condition(&directory, &user, state.config.hierarchy.max_depth).await?;

    let mut select = task::Entity::find().filter(condition);
    if let Some(status) = query.status.as_deref() {
        select = select.filter(task::Column::Status.eq(parse_status(status)?.as_str()));
    }
    if let Some(assignee_id) = query.assignee_id {
        select = select.filter(task::Column::AssigneeId.eq(assignee_id));
    }

    let tasks = select
        .order_by_asc(task::Column::Priority)
        .order_by_asc(task::Column::DueDate)
        .order_by_asc(task::Column::Id)
        .all(state.db.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(
        tasks.into_iter().map(TaskResponse::from).collect(),
    )))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateTaskRequest>,
) -> AppResult<Json<ApiResponse<TaskResponse>>> {
    let (title, priority) = validate_task(&req)?;

    let assignee = match req.assignee_id {
        Some(id) => Some(
            state
                .directory(user.organization_id)
                .find(id)
                .await?
                .ok_or_not_found(format!("person {}", id))?,
        ),
        None => None,
    };

    let now = now_ts();
    let created = task::ActiveModel {
        organization_id: Set(user.organization_id),
        title: Set(title.clone()),
        description: Set(req.description),
        status: Set(TaskStatus::Todo.as_str().to_string()),
        priority: Set(priority),
        assignee_id: Set(req.assignee_id),
        created_by_id: Set(user.user_id.clone()),
        due_date: Set(req.due_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    // Tell the assignee, unless they assigned it to themselves
    if let Some(recipient) = assignee
        .and_then(|p| p.user_id)
        .filter(|uid| *uid != user.user_id)
    {
        if let Err(e) = notify(
            state.db.as_ref(),
            user.organization_id,
            &recipient,
            notification::kind::TASK_ASSIGNED,
            "New task assigned",
            title.as_str(),
        )
        .await
        {
            tracing::warn!("Failed to notify task assignee: {}", e);
        }
    }

    log_operation(&user, OpType::CreateTask, &format!("task {}", created.id), None);
    Ok(Json(ApiResponse::success(created.into())))
}

/// POST /api/tasks/:id/status
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<TaskResponse>>> {
    let status = parse_status(&req.status)?;

    let existing = task::Entity::find_by_id(id)
        .filter(task::Column::OrganizationId.eq(user.organization_id))
        .one(state.db.as_ref())
        .await?
        .ok_or_not_found(format!("task {}", id))?;

    let directory = state.directory(user.organization_id);
    let condition =
        visible_tasks_condition(&directory, &user, state.config.hierarchy.max_depth).await?;
    let visible = task::Entity::find_by_id(id)
        .filter(condition)
        .count(state.db.as_ref())
        .await?
        > 0;
    if !visible {
        log_denied(&user, OpType::UpdateTaskStatus, &format!("task {}", id));
        return Err(AppError::Forbidden);
    }

    let old_status = existing.status.clone();
    let mut model: task::ActiveModel = existing.into();
    model.status = Set(status.as_str().to_string());
    model.updated_at = Set(now_ts());
    let updated = model.update(state.db.as_ref()).await?;

    log_operation(
        &user,
        OpType::UpdateTaskStatus,
        &format!("task {} -> {}", id, status.as_str()),
        Some(old_status),
    );
    Ok(Json(ApiResponse::success(updated.into())))
}
