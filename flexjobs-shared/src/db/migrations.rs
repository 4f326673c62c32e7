/// Embedded schema migrations
///
/// SQL files under `migrations/` at the workspace root are compiled in with
/// `sqlx::migrate!` and applied in version order. The API server calls
/// [`run_migrations`] at startup. The scraper expects a migrated schema.

use std::collections::HashSet;

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::{PgPool, Postgres};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Applied versus embedded migrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Embedded versions not yet recorded as applied, in order
    pub pending: Vec<i64>,
    pub latest_applied: Option<i64>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Embedded migration versions in apply order
pub fn embedded_versions() -> Vec<i64> {
    MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_up_migration())
        .map(|m| m.version)
        .collect()
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let status = migration_status(pool).await.map_err(MigrateError::Execute)?;
    if status.is_current() {
        info!(latest = ?status.latest_applied, "Schema is up to date");
        return Ok(());
    }

    info!(pending = status.pending.len(), "Applying migrations");
    MIGRATOR.run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let tracked: Option<String> = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations')::text")
        .fetch_one(pool)
        .await?;

    let applied: Vec<i64> = if tracked.is_some() {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };

    let done: HashSet<i64> = applied.iter().copied().collect();
    Ok(MigrationStatus {
        pending: embedded_versions()
            .into_iter()
            .filter(|v| !done.contains(v))
            .collect(),
        latest_applied: applied.last().copied(),
    })
}

/// Creates the target database when missing (dev and test setups)
pub async fn ensure_database(url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(url).await? {
        info!("Creating database");
        Postgres::create_database(url).await?;
    }
    Ok(())
}
