use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::directory::PersonDirectory;
use crate::hierarchy::HierarchyResolver;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: Arc<DatabaseConnection>, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Person directory scoped to one organization
    pub fn directory(&self, organization_id: i64) -> PersonDirectory {
        PersonDirectory::new(self.db.clone(), organization_id)
    }

    /// Hierarchy resolver over one organization, using the configured depth limit
    pub fn resolver(&self, organization_id: i64) -> HierarchyResolver<PersonDirectory> {
        HierarchyResolver::with_max_depth(
            self.directory(organization_id),
            self.config.hierarchy.max_depth,
        )
    }
}

/// Mock-backed state and fixtures for handler tests
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::entity::person;
    use crate::hierarchy::PersonId;
    use crate::middleware::CurrentUser;
    use sea_orm::{MockDatabase, Transaction};

    pub const ORG: i64 = 7;

    pub fn mock_state(db: MockDatabase) -> (AppState, Arc<DatabaseConnection>) {
        let db = Arc::new(db.into_connection());
        (AppState::new(db.clone(), Config::default()), db)
    }

    /// Statements issued so far, one entry per transaction. Every other
    /// handle on the connection must be dropped first.
    pub fn transaction_log(db: Arc<DatabaseConnection>) -> Vec<Transaction> {
        match Arc::try_unwrap(db) {
            Ok(db) => db.into_transaction_log(),
            Err(_) => panic!("connection still shared"),
        }
    }

    /// Debug rendering of the whole log, for substring checks
    pub fn log_text(db: Arc<DatabaseConnection>) -> String {
        format!("{:?}", transaction_log(db))
    }

    pub fn person_row(
        id: PersonId,
        manager_id: Option<PersonId>,
        user_id: Option<&str>,
    ) -> person::Model {
        person::Model {
            id,
            organization_id: ORG,
            name: format!("p{}", id),
            email: None,
            role: None,
            team: None,
            status: "active".to_string(),
            manager_id,
            user_id: user_id.map(str::to_string),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn member(user_id: &str, person_id: Option<PersonId>) -> CurrentUser {
        CurrentUser {
            user_id: user_id.to_string(),
            organization_id: ORG,
            person_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: &str, person_id: Option<PersonId>) -> CurrentUser {
        CurrentUser {
            is_admin: true,
            ..member(user_id, person_id)
        }
    }
}
