//! Audit log handlers
//!
//! Query endpoint for the operation log, plus the background writer that
//! persists entries off the request path.

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::entity::op_log;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Query parameters for log pagination
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(rename = "pageSize", default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

/// Log response
#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub id: i64,
    #[serde(rename = "opTime")]
    pub op_time: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "opType")]
    pub op_type: String,
    #[serde(rename = "opDesc")]
    pub op_desc: String,
    #[serde(rename = "oldValue")]
    pub old_value: String,
    pub result: String,
}

impl From<op_log::Model> for LogResponse {
    fn from(m: op_log::Model) -> Self {
        Self {
            id: m.id,
            op_time: m.op_time,
            user_id: m.user_id,
            op_type: m.op_type,
            op_desc: m.op_desc,
            old_value: m.old_value.unwrap_or_default(),
            result: m.result,
        }
    }
}

/// Query response with pagination
#[derive(Debug, Serialize)]
pub struct LogQueryResponse {
    pub logs: Vec<LogResponse>,
    pub total: u64,
}

/// Clamp pagination input to (offset, limit)
fn page_window(page: i64, page_size: i64) -> (u64, u64) {
    let page = page.max(1) as u64;
    let page_size = page_size.clamp(1, 100) as u64;
    ((page - 1) * page_size, page_size)
}

/// GET /api/oplog
pub async fn query_oplog(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<ApiResponse<LogQueryResponse>>> {
    user.require_admin()?;

    let (offset, limit) = page_window(query.page, query.page_size);
    let scoped = op_log::Entity::find()
        .filter(op_log::Column::OrganizationId.eq(user.organization_id));

    let logs = scoped
        .clone()
        .order_by_desc(op_log::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(state.db.as_ref())
        .await?
        .into_iter()
        .map(LogResponse::from)
        .collect();

    let total = scoped.count(state.db.as_ref()).await?;

    Ok(Json(ApiResponse::success(LogQueryResponse { logs, total })))
}

/// Service for adding operation logs
pub mod service {
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    use crate::entity::op_log::{self, OpResult, OpType};
    use crate::middleware::CurrentUser;

    /// Log entry to be added
    #[derive(Debug, Clone)]
    pub struct LogEntry {
        pub organization_id: i64,
        pub user_id: String,
        pub op_type: OpType,
        pub op_desc: String,
        pub old_value: Option<String>,
        pub result: OpResult,
    }

    /// Global log channel
    static LOG_TX: std::sync::OnceLock<mpsc::Sender<LogEntry>> = std::sync::OnceLock::new();

    /// Initialize the audit log service
    /// This function is idempotent - calling it multiple times is safe
    pub fn init(db: Arc<DatabaseConnection>) {
        if LOG_TX.get().is_some() {
            tracing::debug!("Audit log service already initialized, skipping");
            return;
        }

        let (tx, mut rx) = mpsc::channel::<LogEntry>(200);
        if LOG_TX.set(tx).is_err() {
            tracing::debug!("Audit log service initialized by another thread");
            return;
        }

        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let log = op_log::ActiveModel {
                    organization_id: Set(entry.organization_id),
                    op_time: Set(chrono::Utc::now().timestamp()),
                    user_id: Set(entry.user_id),
                    op_type: Set(entry.op_type.as_str().to_string()),
                    op_desc: Set(entry.op_desc),
                    old_value: Set(entry.old_value),
                    result: Set(entry.result.as_str().to_string()),
                    ..Default::default()
                };

                if let Err(e) = log.insert(db.as_ref()).await {
                    tracing::error!("Failed to log operation: {}", e);
                }
            }
        });
    }

    /// Add an operation log entry
    pub fn add_log(entry: LogEntry) {
        if let Some(tx) = LOG_TX.get() {
            if tx.try_send(entry).is_err() {
                tracing::warn!("Log channel is full, operation log dropped");
            }
        } else {
            tracing::debug!(
                "Audit log service not initialized, log dropped: {} - {}",
                entry.op_type.as_str(),
                entry.op_desc
            );
        }
    }

    /// Record a successful operation by the current user
    pub fn log_operation(
        user: &CurrentUser,
        op_type: OpType,
        op_desc: &str,
        old_value: Option<String>,
    ) {
        add_log(LogEntry {
            organization_id: user.organization_id,
            user_id: user.user_id.clone(),
            op_type,
            op_desc: op_desc.to_string(),
            old_value,
            result: OpResult::Success,
        });
    }

    /// Record a refused operation
    pub fn log_denied(user: &CurrentUser, op_type: OpType, op_desc: &str) {
        add_log(LogEntry {
            organization_id: user.organization_id,
            user_id: user.user_id.clone(),
            op_type,
            op_desc: op_desc.to_string(),
            old_value: None,
            result: OpResult::Failed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 10), (0, 10));
        assert_eq!(page_window(3, 20), (40, 20));
        assert_eq!(page_window(0, 0), (0, 1));
        assert_eq!(page_window(2, 1000), (100, 100));
    }

    #[test]
    fn test_log_response_defaults() {
        let resp = LogResponse::from(op_log::Model {
            id: 1,
            organization_id: 7,
            op_time: 100,
            user_id: "user_a".to_string(),
            op_type: "reassign_manager".to_string(),
            op_desc: "person 3".to_string(),
            old_value: None,
            result: "success".to_string(),
        });
        assert_eq!(resp.old_value, "");
        assert_eq!(resp.op_type, "reassign_manager");
    }
}
