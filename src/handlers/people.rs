//! People handlers
//!
//! Person CRUD, manager chain, reports and the org chart

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::access::ensure_manager_or_self;
use crate::entity::op_log::OpType;
use crate::entity::person::{self, PersonResponse, PersonStatus};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_operation;
use crate::handlers::now_ts;
use crate::hierarchy::PersonId;
use crate::middleware::CurrentUser;
use crate::orgchart::{all_reports, build_org_tree, validate_reassignment, OrgNode, ReportLookup};
use crate::routes::ApiResponse;
use crate::state::AppState;

const MAX_NAME_CHARS: usize = 128;

/// Create person request
#[derive(Debug, Deserialize)]
pub struct CreatePersonRequest {
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub team: Option<String>,
    #[serde(rename = "managerId")]
    pub manager_id: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Update person request. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePersonRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub team: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "managerId")]
    pub manager_id: Option<i64>,
    /// Make the person a root of the org chart
    #[serde(rename = "clearManager", default)]
    pub clear_manager: bool,
}

impl UpdatePersonRequest {
    /// Requested manager change, if any: `Some(None)` clears the manager
    fn manager_change(&self) -> Option<Option<PersonId>> {
        if self.clear_manager {
            Some(None)
        } else {
            self.manager_id.map(Some)
        }
    }
}

/// Reports response
#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub direct: Vec<PersonResponse>,
    pub all: Vec<PersonResponse>,
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "name must not exceed {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

/// Load people by id, keeping the order of `ids`
async fn load_ordered(
    state: &AppState,
    organization_id: i64,
    ids: &[PersonId],
) -> AppResult<Vec<PersonResponse>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut rows = person::Entity::find()
        .filter(person::Column::OrganizationId.eq(organization_id))
        .filter(person::Column::Id.is_in(ids.iter().copied()))
        .all(state.db.as_ref())
        .await?;
    rows.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
    Ok(rows.into_iter().map(PersonResponse::from).collect())
}

/// GET /api/people
pub async fn list_people(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<PersonResponse>>>> {
    let people = state.directory(user.organization_id).all().await?;
    Ok(Json(ApiResponse::success(
        people.into_iter().map(PersonResponse::from).collect(),
    )))
}

/// GET /api/people/:id
pub async fn get_person(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<PersonResponse>>> {
    let resolver = state.resolver(user.organization_id);
    ensure_manager_or_self(&resolver, &user, id).await?;

    let person = resolver
        .lookup()
        .find(id)
        .await?
        .ok_or_not_found(format!("person {}", id))?;
    Ok(Json(ApiResponse::success(person.into())))
}

/// POST /api/people
pub async fn create_person(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreatePersonRequest>,
) -> AppResult<Json<ApiResponse<PersonResponse>>> {
    user.require_admin()?;
    let name = validate_name(&req.name)?;

    let resolver = state.resolver(user.organization_id);
    if let Some(manager_id) = req.manager_id {
        resolver.require(manager_id).await?;
    }
    if let Some(user_id) = req.user_id.as_deref() {
        if resolver.lookup().find_by_user(user_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "user {} is already linked to a person",
                user_id
            )));
        }
    }

    let now = now_ts();
    let created = person::ActiveModel {
        organization_id: Set(user.organization_id),
        name: Set(name.clone()),
        email: Set(req.email),
        role: Set(req.role),
        team: Set(req.team),
        status: Set(PersonStatus::Active.as_str().to_string()),
        manager_id: Set(req.manager_id),
        user_id: Set(req.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(state.db.as_ref())
    .await?;

    tracing::info!(person_id = created.id, organization_id = user.organization_id, "Person created");
    log_operation(&user, OpType::CreatePerson, &format!("person {}: {}", created.id, name), None);

    Ok(Json(ApiResponse::success(created.into())))
}

/// POST /api/people/:id/update
pub async fn update_person(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePersonRequest>,
) -> AppResult<Json<ApiResponse<PersonResponse>>> {
    user.require_admin()?;

    let resolver = state.resolver(user.organization_id);
    let existing = resolver
        .lookup()
        .find(id)
        .await?
        .ok_or_not_found(format!("person {}", id))?;

    let manager_change = req.manager_change();
    if let Some(new_manager) = manager_change {
        if let Some(manager_id) = new_manager {
            resolver.require(manager_id).await?;
        }
        validate_reassignment(&resolver, id, new_manager).await?;
    }

    let old_manager = existing.manager_id;
    let mut model: person::ActiveModel = existing.into();
    if let Some(name) = req.name.as_deref() {
        model.name = Set(validate_name(name)?);
    }
    if let Some(email) = req.email {
        model.email = Set(Some(email));
    }
    if let Some(role) = req.role {
        model.role = Set(Some(role));
    }
    if let Some(team) = req.team {
        model.team = Set(Some(team));
    }
    if let Some(status) = req.status.as_deref() {
        let status = PersonStatus::parse(status)
            .ok_or_else(|| AppError::Validation(format!("unknown status: {}", status)))?;
        model.status = Set(status.as_str().to_string());
    }
    if let Some(new_manager) = manager_change {
        model.manager_id = Set(new_manager);
    }
    model.updated_at = Set(now_ts());

    let updated = model.update(state.db.as_ref()).await?;

    match manager_change {
        Some(new_manager) if new_manager != old_manager => {
            tracing::info!(person_id = id, ?old_manager, ?new_manager, "Manager reassigned");
            log_operation(
                &user,
                OpType::ReassignManager,
                &format!("person {} -> manager {:?}", id, new_manager),
                old_manager.map(|m| m.to_string()),
            );
        }
        _ => log_operation(&user, OpType::UpdatePerson, &format!("person {}", id), None),
    }

    Ok(Json(ApiResponse::success(updated.into())))
}

/// POST /api/people/:id/delete
///
/// Direct reports move up to the deleted person's manager.
pub async fn delete_person(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.require_admin()?;

    let existing = state
        .directory(user.organization_id)
        .find(id)
        .await?
        .ok_or_not_found(format!("person {}", id))?;

    // A self-managed row must not hand itself to its reports
    let new_manager = existing.manager_id.filter(|m| *m != id);

    let txn = state.db.begin().await?;
    let moved = person::Entity::update_many()
        .col_expr(person::Column::ManagerId, Expr::value(new_manager))
        .col_expr(person::Column::UpdatedAt, Expr::value(now_ts()))
        .filter(person::Column::OrganizationId.eq(user.organization_id))
        .filter(person::Column::ManagerId.eq(id))
        .filter(person::Column::Id.ne(id))
        .exec(&txn)
        .await?;
    person::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(person_id = id, reports_moved = moved.rows_affected, "Person deleted");
    log_operation(
        &user,
        OpType::DeletePerson,
        &format!("person {}: {}", id, existing.name),
        existing.manager_id.map(|m| m.to_string()),
    );

    Ok(Json(ApiResponse::success_msg("success")))
}

/// GET /api/people/:id/chain
pub async fn get_chain(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<PersonResponse>>>> {
    let resolver = state.resolver(user.organization_id);
    ensure_manager_or_self(&resolver, &user, id).await?;

    let chain = resolver.manager_chain(id).await?;
    let people = load_ordered(&state, user.organization_id, &chain).await?;
    Ok(Json(ApiResponse::success(people)))
}

/// GET /api/people/:id/reports
pub async fn get_reports(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<ReportsResponse>>> {
    let resolver = state.resolver(user.organization_id);
    ensure_manager_or_self(&resolver, &user, id).await?;

    let directory = resolver.lookup();
    let direct_ids = directory.direct_reports(id).await?;
    let all_ids = all_reports(directory, id, state.config.hierarchy.max_depth).await?;

    Ok(Json(ApiResponse::success(ReportsResponse {
        direct: load_ordered(&state, user.organization_id, &direct_ids).await?,
        all: load_ordered(&state, user.organization_id, &all_ids).await?,
    })))
}

/// GET /api/org-chart
pub async fn org_chart(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<OrgNode>>>> {
    let people = state.directory(user.organization_id).all().await?;
    Ok(Json(ApiResponse::success(build_org_tree(people))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{admin, log_text, member, mock_state, person_row};
    use sea_orm::{DbBackend, MockDatabase, MockExecResult};

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_delete_moves_reports_to_manager() {
        let (state, db) = mock_state(
            MockDatabase::new(DbBackend::Postgres)
                .append_query_results([vec![person_row(5, Some(1), None)]])
                .append_exec_results([exec(2), exec(1)]),
        );

        let result = delete_person(State(state), Extension(admin("user_admin", None)), Path(5)).await;
        assert!(result.is_ok());

        let log = log_text(db);
        let update = log.find("UPDATE").unwrap();
        let delete = log.find("DELETE").unwrap();
        assert!(update < delete);
        assert!(log[update..delete].contains("manager_id"));
        // Reports of 5 now point at 1
        assert!(log[update..delete].contains("BigInt(Some(1))"));
    }

    #[tokio::test]
    async fn test_delete_self_managed_person_clears_manager() {
        let (state, db) = mock_state(
            MockDatabase::new(DbBackend::Postgres)
                .append_query_results([vec![person_row(5, Some(5), None)]])
                .append_exec_results([exec(0), exec(1)]),
        );

        let result = delete_person(State(state), Extension(admin("user_admin", None)), Path(5)).await;
        assert!(result.is_ok());

        let log = log_text(db);
        let update = log.find("UPDATE").unwrap();
        let delete = log.find("DELETE").unwrap();
        assert!(log[update..delete].contains("BigInt(None)"));
    }

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let (state, db) = mock_state(MockDatabase::new(DbBackend::Postgres));

        let result = delete_person(State(state), Extension(member("user_lead", Some(1))), Path(5)).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
        assert!(!log_text(db).contains("DELETE"));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Ada Lovelace ").unwrap(), "Ada Lovelace");
        assert!(matches!(validate_name("   "), Err(AppError::Validation(_))));
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn test_manager_change() {
        let req: UpdatePersonRequest = serde_json::from_str(r#"{"name": "Bo"}"#).unwrap();
        assert_eq!(req.manager_change(), None);

        let req: UpdatePersonRequest = serde_json::from_str(r#"{"managerId": 4}"#).unwrap();
        assert_eq!(req.manager_change(), Some(Some(4)));

        let req: UpdatePersonRequest =
            serde_json::from_str(r#"{"managerId": 4, "clearManager": true}"#).unwrap();
        assert_eq!(req.manager_change(), Some(None));
    }
}
