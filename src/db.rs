use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Schema,
    Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{feedback, notification, op_log, organization, person, task};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);

    let mut opt = ConnectOptions::new(&database_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .set_schema_search_path("public");

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Create every table that does not exist yet
async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    create_table_if_not_exists(db, backend, schema.create_table_from_entity(organization::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(person::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(task::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(notification::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(feedback::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(op_log::Entity)).await?;

    for stmt in index_statements() {
        db.execute(backend.build(&stmt)).await?;
    }

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Indexes backing the organization-scoped lookups
fn index_statements() -> Vec<IndexCreateStatement> {
    vec![
        // Upward walks and report listings
        Index::create()
            .if_not_exists()
            .name("idx_mp_person_org_manager")
            .table(person::Entity)
            .col(person::Column::OrganizationId)
            .col(person::Column::ManagerId)
            .to_owned(),
        // One person per identity within an organization
        Index::create()
            .if_not_exists()
            .name("idx_mp_person_org_user")
            .table(person::Entity)
            .col(person::Column::OrganizationId)
            .col(person::Column::UserId)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_mp_task_org_assignee")
            .table(task::Entity)
            .col(task::Column::OrganizationId)
            .col(task::Column::AssigneeId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_mp_notification_org_user")
            .table(notification::Entity)
            .col(notification::Column::OrganizationId)
            .col(notification::Column::UserId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_mp_feedback_org_about")
            .table(feedback::Entity)
            .col(feedback::Column::OrganizationId)
            .col(feedback::Column::AboutPersonId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_mp_op_log_org")
            .table(op_log::Entity)
            .col(op_log::Column::OrganizationId)
            .to_owned(),
    ]
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_table_ddl() {
        let backend = DbBackend::Postgres;
        let mut stmt = Schema::new(backend).create_table_from_entity(person::Entity);
        stmt.if_not_exists();
        let sql = backend.build(&stmt).to_string();

        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "mp_person""#));
        assert!(sql.contains(r#""manager_id" bigint"#));
        assert!(!sql.contains(r#""manager_id" bigint NOT NULL"#));
    }

    #[test]
    fn test_person_indexes() {
        let sql: Vec<String> = index_statements()
            .iter()
            .map(|stmt| DbBackend::Postgres.build(stmt).to_string())
            .collect();

        assert!(sql
            .iter()
            .any(|s| s.contains("UNIQUE INDEX") && s.contains("idx_mp_person_org_user")));
        assert!(sql.iter().all(|s| s.contains("IF NOT EXISTS")));
    }
}
