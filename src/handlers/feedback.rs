//! Feedback handlers

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::access::ensure_manager_or_self;
use crate::entity::feedback::{self, FeedbackKind};
use crate::entity::notification;
use crate::entity::op_log::OpType;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_operation;
use crate::handlers::notifications::notify;
use crate::handlers::now_ts;
use crate::hierarchy::PersonId;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

const MAX_BODY_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    pub kind: FeedbackKind,
    pub body: String,
    #[serde(rename = "isPrivate", default)]
    pub is_private: bool,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: i64,
    #[serde(rename = "aboutPersonId")]
    pub about_person_id: i64,
    #[serde(rename = "fromUserId")]
    pub from_user_id: String,
    pub kind: String,
    pub body: String,
    #[serde(rename = "isPrivate")]
    pub is_private: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl From<feedback::Model> for FeedbackResponse {
    fn from(m: feedback::Model) -> Self {
        Self {
            id: m.id,
            about_person_id: m.about_person_id,
            from_user_id: m.from_user_id,
            kind: m.kind,
            body: m.body,
            is_private: m.is_private,
            created_at: m.created_at,
        }
    }
}

/// Feedback about `about` that `user` may read, assuming the
/// manager-or-self gate already passed. The subject, admin or not, only
/// sees private items they wrote themselves.
pub fn feedback_visibility_condition(user: &CurrentUser, about: PersonId) -> Condition {
    let scope = Condition::all()
        .add(feedback::Column::OrganizationId.eq(user.organization_id))
        .add(feedback::Column::AboutPersonId.eq(about));

    if user.person_id != Some(about) {
        return scope;
    }

    scope.add(
        Condition::any()
            .add(feedback::Column::IsPrivate.eq(false))
            .add(feedback::Column::FromUserId.eq(user.user_id.as_str())),
    )
}

/// GET /api/people/:id/feedback
pub async fn list_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<FeedbackResponse>>>> {
    let resolver = state.resolver(user.organization_id);
    ensure_manager_or_self(&resolver, &user, id).await?;

    let items = feedback::Entity::find()
        .filter(feedback_visibility_condition(&user, id))
        .order_by_desc(feedback::Column::CreatedAt)
        .all(state.db.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(
        items.into_iter().map(FeedbackResponse::from).collect(),
    )))
}

/// POST /api/people/:id/feedback
pub async fn create_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CreateFeedbackRequest>,
) -> AppResult<Json<ApiResponse<FeedbackResponse>>> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("feedback must not be empty".to_string()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::Validation(format!(
            "feedback must not exceed {} characters",
            MAX_BODY_CHARS
        )));
    }

    let directory = state.directory(user.organization_id);
    let subject = directory
        .find(id)
        .await?
        .ok_or_not_found(format!("person {}", id))?;

    let created = feedback::ActiveModel {
        organization_id: Set(user.organization_id),
        about_person_id: Set(id),
        from_user_id: Set(user.user_id.clone()),
        kind: Set(req.kind.as_str().to_string()),
        body: Set(body.to_string()),
        is_private: Set(req.is_private),
        created_at: Set(now_ts()),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    // Let the subject's direct manager know
    if let Some(manager_id) = subject.manager_id {
        let recipient = directory
            .find(manager_id)
            .await?
            .and_then(|m| m.user_id)
            .filter(|uid| *uid != user.user_id);
        if let Some(recipient) = recipient {
            let message = format!("New {} feedback about {}", req.kind.as_str(), subject.name);
            if let Err(e) = notify(
                state.db.as_ref(),
                user.organization_id,
                &recipient,
                notification::kind::FEEDBACK_RECEIVED,
                "Feedback received",
                message,
            )
            .await
            {
                tracing::warn!("Failed to notify manager about feedback: {}", e);
            }
        }
    }

    log_operation(&user, OpType::LeaveFeedback, &format!("person {}", id), None);
    Ok(Json(ApiResponse::success(created.into())))
}
