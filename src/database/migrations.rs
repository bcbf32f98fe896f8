//! # Schema Migrations
//!
//! Applies the SQL files in a migrations directory in version order and
//! records each applied version in `process_manager_schema_migrations`.
//!
//! Several replicas may start at once, so the run is serialized with a
//! PostgreSQL advisory lock held for the duration of the run:
//!
//! ```sql
//! SELECT pg_advisory_lock(7_305_118_244_901_337)
//! ```
//!
//! Files are named `YYYYMMDDHHMMSS_description.sql`; anything else in the
//! directory is ignored.

use crate::error::{ProcessManagerError, Result};
use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MIGRATION_LOCK_KEY: i64 = 7_305_118_244_901_337;

/// A single migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Version timestamp (YYYYMMDDHHMMSS)
    pub version: String,
    pub name: String,
    pub path: PathBuf,
}

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply outstanding migrations from `migrations_dir`; returns how many were applied.
    pub async fn run_all(pool: &PgPool, migrations_dir: &Path) -> Result<usize> {
        let migrations = Self::discover_migrations(migrations_dir)?;

        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let result = Self::run_outstanding_migrations(pool, &migrations).await;

        // Released on the same connection that took it.
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        result
    }

    async fn run_outstanding_migrations(
        pool: &PgPool,
        migrations: &BTreeMap<String, Migration>,
    ) -> Result<usize> {
        Self::ensure_migration_table(pool).await?;
        let applied = Self::get_applied_migrations(pool).await?;

        let mut count = 0;
        for migration in migrations.values() {
            if applied.contains(&migration.version) {
                continue;
            }

            info!(
                version = %migration.version,
                name = %migration.name,
                "Applying migration"
            );
            let sql = fs::read_to_string(&migration.path).map_err(|error| {
                ProcessManagerError::DatabaseError(format!(
                    "Cannot read migration {}: {error}",
                    migration.path.display()
                ))
            })?;

            let mut tx = pool.begin().await?;
            sqlx::raw_sql(&sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO process_manager_schema_migrations (version) VALUES ($1)")
                .bind(&migration.version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            count += 1;
        }

        Ok(count)
    }

    /// Migration files in `migrations_dir`, keyed and ordered by version.
    pub fn discover_migrations(migrations_dir: &Path) -> Result<BTreeMap<String, Migration>> {
        let mut migrations = BTreeMap::new();
        if !migrations_dir.exists() {
            return Ok(migrations);
        }

        let entries = fs::read_dir(migrations_dir).map_err(|error| {
            ProcessManagerError::DatabaseError(format!(
                "Cannot read migrations directory {}: {error}",
                migrations_dir.display()
            ))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|error| ProcessManagerError::DatabaseError(error.to_string()))?
                .path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some((version, name)) = Self::parse_migration_filename(stem) {
                migrations.insert(
                    version.clone(),
                    Migration {
                        version,
                        name,
                        path: path.clone(),
                    },
                );
            }
        }

        Ok(migrations)
    }

    fn parse_migration_filename(filename: &str) -> Option<(String, String)> {
        if filename.len() < 15 || !filename.is_char_boundary(14) {
            return None;
        }

        let (version, name) = filename.split_at(14);
        if !version.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let name = name.strip_prefix('_').unwrap_or(name).replace('_', " ");
        Some((version.to_string(), name))
    }

    async fn ensure_migration_table(pool: &PgPool) -> Result<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS process_manager_schema_migrations (
                version VARCHAR(14) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn get_applied_migrations(pool: &PgPool) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT version FROM process_manager_schema_migrations")
            .fetch_all(pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("version"))
            .collect())
    }
}
