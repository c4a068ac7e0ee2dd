use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // People
        .route(
            "/people",
            get(handlers::people::list_people).post(handlers::people::create_person),
        )
        .route("/people/:id", get(handlers::people::get_person))
        .route("/people/:id/update", post(handlers::people::update_person))
        .route("/people/:id/delete", post(handlers::people::delete_person))
        .route("/people/:id/chain", get(handlers::people::get_chain))
        .route("/people/:id/reports", get(handlers::people::get_reports))
        .route(
            "/people/:id/feedback",
            get(handlers::feedback::list_feedback).post(handlers::feedback::create_feedback),
        )
        .route("/org-chart", get(handlers::people::org_chart))
        // Tasks
        .route(
            "/tasks",
            get(handlers::tasks::list_tasks).post(handlers::tasks::create_task),
        )
        .route("/tasks/:id/status", post(handlers::tasks::update_task_status))
        // Notifications
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/notifications/read-all", post(handlers::notifications::mark_all_read))
        .route("/notifications/:id/read", post(handlers::notifications::mark_read))
        // Audit log
        .route("/oplog", get(handlers::audit::query_oplog));

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;

    fn app() -> Router {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        create_router(AppState::new(db, Config::default()))
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let response = app()
            .oneshot(Request::builder().uri("/api/people").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_rejects_bad_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/org-chart")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_path_falls_back() {
        let response = app()
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_response_shape() {
        let json = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(json["code"], true);
        assert_eq!(json["data"], serde_json::json!([1, 2]));

        let json = serde_json::to_value(ApiResponse::success_msg("done")).unwrap();
        assert!(json.get("data").is_none());
    }
}
