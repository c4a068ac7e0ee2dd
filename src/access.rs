//! Access decisions
//!
//! The manager-or-self gate for person-scoped pages, and the filter
//! conditions that decide which tasks and notifications a caller may list.

use sea_orm::{ColumnTrait, Condition, DbErr};

use crate::entity::{notification, op_log::OpType, task};
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::log_denied;
use crate::hierarchy::{HierarchyResolver, ManagerLookup, PersonId};
use crate::middleware::CurrentUser;
use crate::orgchart::{all_reports, ReportLookup};

/// Gate a person-scoped view.
///
/// Admins pass for any existing person. Everyone else must be the person or
/// one of their managers. A missing target is `NotFound` for every caller,
/// checked before the permission decision.
pub async fn ensure_manager_or_self<L: ManagerLookup>(
    resolver: &HierarchyResolver<L>,
    user: &CurrentUser,
    target: PersonId,
) -> AppResult<()> {
    if user.is_admin {
        resolver.require(target).await?;
        return Ok(());
    }

    let allowed = match user.person_id {
        Some(viewer) => resolver.is_manager_or_self(viewer, target).await?,
        None => {
            resolver.require(target).await?;
            false
        }
    };

    if allowed {
        Ok(())
    } else {
        tracing::info!(user_id = %user.user_id, target_id = target, "Person view denied");
        log_denied(user, OpType::AccessDenied, &format!("person {}", target));
        Err(AppError::Forbidden)
    }
}

/// Whether `user` may see a task: organization scope plus one of
/// creator, assignee, or manager of the assignee. Admins see every task.
///
/// `report_ids` are the caller's transitive reports.
pub fn task_access_condition(user: &CurrentUser, report_ids: &[PersonId]) -> Condition {
    let scope = Condition::all().add(task::Column::OrganizationId.eq(user.organization_id));
    if user.is_admin {
        return scope;
    }

    let mut visible = Condition::any().add(task::Column::CreatedById.eq(user.user_id.as_str()));
    if let Some(person_id) = user.person_id {
        visible = visible.add(task::Column::AssigneeId.eq(person_id));
    }
    if !report_ids.is_empty() {
        visible = visible.add(task::Column::AssigneeId.is_in(report_ids.iter().copied()));
    }

    scope.add(visible)
}

/// Build the task condition, loading the caller's reports first.
pub async fn visible_tasks_condition<L: ReportLookup>(
    lookup: &L,
    user: &CurrentUser,
    max_depth: usize,
) -> Result<Condition, DbErr> {
    let reports = match (user.is_admin, user.person_id) {
        (false, Some(person_id)) => all_reports(lookup, person_id, max_depth).await?,
        _ => Vec::new(),
    };
    Ok(task_access_condition(user, &reports))
}

/// Notifications are private to their recipient within the organization.
pub fn notification_access_condition(user: &CurrentUser) -> Condition {
    Condition::all()
        .add(notification::Column::OrganizationId.eq(user.organization_id))
        .add(notification::Column::UserId.eq(user.user_id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::MemoryDirectory;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    fn user(person_id: Option<PersonId>, is_admin: bool) -> CurrentUser {
        CurrentUser {
            user_id: "user_a".to_string(),
            organization_id: 7,
            person_id,
            is_admin,
        }
    }

    /// 1 <- 2 <- 3, 4 alone
    fn directory() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_person(1, None)
            .with_person(2, Some(1))
            .with_person(3, Some(2))
            .with_person(4, None)
    }

    fn task_sql(cond: Condition) -> String {
        task::Entity::find()
            .filter(cond)
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[tokio::test]
    async fn test_gate_allows_managers_and_self() {
        let resolver = HierarchyResolver::new(directory());
        ensure_manager_or_self(&resolver, &user(Some(1), false), 3).await.unwrap();
        ensure_manager_or_self(&resolver, &user(Some(3), false), 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_gate_splits_forbidden_and_not_found() {
        let resolver = HierarchyResolver::new(directory());
        assert!(matches!(
            ensure_manager_or_self(&resolver, &user(Some(3), false), 1).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_manager_or_self(&resolver, &user(Some(4), false), 99).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            ensure_manager_or_self(&resolver, &user(None, false), 2).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_manager_or_self(&resolver, &user(None, false), 99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_gate_admin_bypass() {
        let resolver = HierarchyResolver::new(directory());
        ensure_manager_or_self(&resolver, &user(None, true), 4).await.unwrap();
        assert!(matches!(
            ensure_manager_or_self(&resolver, &user(None, true), 99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_gate_reports_corruption() {
        let dir = MemoryDirectory::new()
            .with_person(1, Some(2))
            .with_person(2, Some(1))
            .with_person(5, None);
        let resolver = HierarchyResolver::new(dir);
        assert!(matches!(
            ensure_manager_or_self(&resolver, &user(Some(5), false), 1).await,
            Err(AppError::CorruptedHierarchy(_))
        ));
    }

    #[test]
    fn test_task_condition_member() {
        let sql = task_sql(task_access_condition(&user(Some(2), false), &[3, 8]));
        assert!(sql.contains(r#""mp_task"."organization_id" = 7"#));
        assert!(sql.contains(r#""mp_task"."created_by_id" = 'user_a'"#));
        assert!(sql.contains(r#""mp_task"."assignee_id" = 2"#));
        assert!(sql.contains(r#""mp_task"."assignee_id" IN (3, 8)"#));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_task_condition_admin_is_org_scoped_only() {
        let sql = task_sql(task_access_condition(&user(Some(2), true), &[]));
        assert!(sql.contains(r#""mp_task"."organization_id" = 7"#));
        assert!(!sql.contains(r#""created_by_id" ="#));
        assert!(!sql.contains(r#""assignee_id" ="#));
    }

    #[test]
    fn test_task_condition_without_person() {
        let sql = task_sql(task_access_condition(&user(None, false), &[]));
        assert!(sql.contains(r#""mp_task"."created_by_id" = 'user_a'"#));
        assert!(!sql.contains(r#""assignee_id" ="#));
        assert!(!sql.contains(r#""assignee_id" IN"#));
    }

    #[tokio::test]
    async fn test_visible_tasks_include_transitive_reports() {
        let cond = visible_tasks_condition(&directory(), &user(Some(1), false), 16)
            .await
            .unwrap();
        let sql = task_sql(cond);
        assert!(sql.contains(r#""mp_task"."assignee_id" IN (2, 3)"#));
    }

    #[test]
    fn test_notification_condition() {
        let sql = notification::Entity::find()
            .filter(notification_access_condition(&user(Some(1), true)))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""mp_notification"."organization_id" = 7"#));
        assert!(sql.contains(r#""mp_notification"."user_id" = 'user_a'"#));
    }
}
