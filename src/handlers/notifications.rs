//! Notification handlers
//!
//! Listing and read-state for the caller's own notifications, and the helper
//! other handlers use to raise one.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::access::notification_access_condition;
use crate::entity::notification;
use crate::error::{AppResult, OptionExt};
use crate::handlers::now_ts;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

const MAX_LISTED: u64 = 200;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "unreadOnly", default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl From<notification::Model> for NotificationResponse {
    fn from(m: notification::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            title: m.title,
            message: m.message,
            read: m.read,
            created_at: m.created_at,
        }
    }
}

/// Raise a notification for `user_id`
pub async fn notify<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    user_id: &str,
    kind: &str,
    title: impl Into<String>,
    message: impl Into<String>,
) -> Result<notification::Model, DbErr> {
    notification::ActiveModel {
        organization_id: Set(organization_id),
        user_id: Set(user_id.to_string()),
        kind: Set(kind.to_string()),
        title: Set(title.into()),
        message: Set(message.into()),
        read: Set(false),
        created_at: Set(now_ts()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<ApiResponse<Vec<NotificationResponse>>>> {
    let mut select = notification::Entity::find().filter(notification_access_condition(&user));
    if query.unread_only {
        select = select.filter(notification::Column::Read.eq(false));
    }

    let items = select
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .limit(MAX_LISTED)
        .all(state.db.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(
        items.into_iter().map(NotificationResponse::from).collect(),
    )))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<NotificationResponse>>> {
    // Someone else's notification is indistinguishable from a missing one
    let item = notification::Entity::find_by_id(id)
        .filter(notification_access_condition(&user))
        .one(state.db.as_ref())
        .await?
        .ok_or_not_found(format!("notification {}", id))?;

    let item = if item.read {
        item
    } else {
        let mut model: notification::ActiveModel = item.into();
        model.read = Set(true);
        model.update(state.db.as_ref()).await?
    };

    Ok(Json(ApiResponse::success(item.into())))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    let res = notification::Entity::update_many()
        .col_expr(notification::Column::Read, Expr::value(true))
        .filter(notification_access_condition(&user))
        .filter(notification::Column::Read.eq(false))
        .exec(state.db.as_ref())
        .await?;

    Ok(Json(ApiResponse::success_msg(format!(
        "marked {} notifications read",
        res.rows_affected
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_notify_inserts_unread() {
        let stored = notification::Model {
            id: 11,
            organization_id: 7,
            user_id: "user_b".to_string(),
            kind: notification::kind::TASK_ASSIGNED.to_string(),
            title: "New task".to_string(),
            message: "Ship it".to_string(),
            read: false,
            created_at: 1,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored.clone()]])
            .into_connection();

        let created = notify(
            &db,
            7,
            "user_b",
            notification::kind::TASK_ASSIGNED,
            "New task",
            "Ship it",
        )
        .await
        .unwrap();
        assert_eq!(created, stored);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("INSERT INTO"));
        assert!(log.contains("mp_notification"));
    }
}
