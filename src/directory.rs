//! Database-backed person directory
//!
//! Every query is scoped to one organization, so a manager edge pointing
//! into another tenant behaves like a missing row.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

use crate::entity::person;
use crate::hierarchy::{ManagerLookup, PersonId, PersonLink};
use crate::orgchart::ReportLookup;

#[derive(Clone, Debug)]
pub struct PersonDirectory {
    db: Arc<DatabaseConnection>,
    organization_id: i64,
}

impl PersonDirectory {
    pub fn new(db: Arc<DatabaseConnection>, organization_id: i64) -> Self {
        Self {
            db,
            organization_id,
        }
    }

    pub fn organization_id(&self) -> i64 {
        self.organization_id
    }

    /// Load a full person row within the organization
    pub async fn find(&self, person_id: PersonId) -> Result<Option<person::Model>, DbErr> {
        person::Entity::find_by_id(person_id)
            .filter(person::Column::OrganizationId.eq(self.organization_id))
            .one(self.db.as_ref())
            .await
    }

    /// All people of the organization, by name
    pub async fn all(&self) -> Result<Vec<person::Model>, DbErr> {
        person::Entity::find()
            .filter(person::Column::OrganizationId.eq(self.organization_id))
            .order_by_asc(person::Column::Name)
            .all(self.db.as_ref())
            .await
    }

    /// Person linked to an identity provider subject
    pub async fn find_by_user(&self, user_id: &str) -> Result<Option<person::Model>, DbErr> {
        person::Entity::find()
            .filter(person::Column::OrganizationId.eq(self.organization_id))
            .filter(person::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
    }
}

#[async_trait]
impl ManagerLookup for PersonDirectory {
    async fn find_link(&self, person_id: PersonId) -> Result<Option<PersonLink>, DbErr> {
        Ok(self.find(person_id).await?.map(|p| PersonLink {
            id: p.id,
            manager_id: p.manager_id,
        }))
    }
}

#[async_trait]
impl ReportLookup for PersonDirectory {
    async fn direct_reports(&self, manager_id: PersonId) -> Result<Vec<PersonId>, DbErr> {
        let reports = person::Entity::find()
            .filter(person::Column::OrganizationId.eq(self.organization_id))
            .filter(person::Column::ManagerId.eq(manager_id))
            .order_by_asc(person::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(reports.into_iter().map(|p| p.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyResolver;
    use crate::state::test_support::{person_row, transaction_log};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn person(id: PersonId, manager_id: Option<PersonId>) -> person::Model {
        person_row(id, manager_id, None)
    }

    #[tokio::test]
    async fn test_resolver_over_database() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![person(1, Some(2))]])
                .append_query_results([vec![person(2, Some(3))]])
                .append_query_results([vec![person(3, None)]])
                .into_connection(),
        );

        let resolver = HierarchyResolver::new(PersonDirectory::new(db.clone(), 7));
        assert!(resolver.is_manager(3, 1).await.unwrap());
        drop(resolver);

        let log = transaction_log(db);
        assert_eq!(log.len(), 3);
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("organization_id"));
    }

    #[tokio::test]
    async fn test_missing_row_is_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<person::Model>::new()])
                .into_connection(),
        );

        let dir = PersonDirectory::new(db, 7);
        assert_eq!(dir.find_link(5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_direct_reports() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![person(4, Some(1)), person(6, Some(1))]])
                .into_connection(),
        );

        let dir = PersonDirectory::new(db, 7);
        assert_eq!(dir.direct_reports(1).await.unwrap(), vec![4, 6]);
    }
}
