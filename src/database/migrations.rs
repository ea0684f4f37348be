//! # Database Migrations
//!
//! Schema migrations live in `migrations/` as `YYYYMMDDHHMMSS_description.sql`
//! and are embedded at build time. sqlx records applied versions in
//! `_sqlx_migrations` and takes an advisory lock while migrating, so several
//! processes may call [`DatabaseMigrations::run_all`] at once.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::PgPool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> Result<(), MigrateError> {
        MIGRATOR.run(pool).await?;
        info!(
            available = MIGRATOR.iter().count(),
            "Database migrations applied"
        );
        Ok(())
    }

    /// The embedded migrator, for `#[sqlx::test(migrator = ...)]` style callers
    pub fn migrator() -> &'static Migrator {
        &MIGRATOR
    }
}
