use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::hierarchy::HierarchyError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupted hierarchy: {0}")]
    CorruptedHierarchy(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::CorruptedHierarchy(msg) => {
                tracing::error!("Corrupted hierarchy: {}", msg);
                (StatusCode::CONFLICT, "Corrupted Hierarchy", Some(msg.clone()))
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database Error", None)
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Validation Error", Some(msg.clone()))
            }
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            message: message.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

impl From<HierarchyError> for AppError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::NotFound(id) => AppError::NotFound(format!("person {}", id)),
            HierarchyError::WouldCycle { .. } => AppError::Conflict(err.to_string()),
            HierarchyError::Cycle { .. } | HierarchyError::TooDeep { .. } => {
                AppError::CorruptedHierarchy(err.to_string())
            }
            HierarchyError::Lookup(db) => AppError::Database(db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = AppError::NotFound("person 3".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_not_found("Item not found");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_hierarchy_errors_keep_kinds_apart() {
        let not_found: AppError = HierarchyError::NotFound(4).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let cycle: AppError = HierarchyError::Cycle { person_id: 2 }.into();
        assert!(matches!(cycle, AppError::CorruptedHierarchy(_)));
        assert_eq!(cycle.into_response().status(), StatusCode::CONFLICT);

        let would_cycle: AppError = HierarchyError::WouldCycle {
            person_id: 1,
            manager_id: 3,
        }
        .into();
        assert!(matches!(would_cycle, AppError::Conflict(_)));

        assert_eq!(AppError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
    }
}
