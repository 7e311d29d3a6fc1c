//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked via the schema_version table.
//! Never modify an existing migration; add a new one and bump
//! CURRENT_SCHEMA_VERSION.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Record a schema version in the database
async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current = get_schema_version(pool).await?;

    if current < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Applied schema migration v1");
    }

    if current < CURRENT_SCHEMA_VERSION {
        info!(
            "Database schema upgraded from v{} to v{}",
            current, CURRENT_SCHEMA_VERSION
        );
    }

    Ok(())
}

/// v1: relationship snapshot and active connection tables
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    // Full relationship store snapshot, replaced atomically each write-back
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS relationship_snapshot (
            subject_id TEXT NOT NULL,
            identity_key TEXT NOT NULL,
            display_name TEXT NOT NULL,
            bio TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            routing_key TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (subject_id, identity_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // User-confirmed connections, the durable record behind explicit adds
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS active_connections (
            subject_id TEXT NOT NULL,
            identity_key TEXT NOT NULL,
            kind TEXT NOT NULL,
            routing_key TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (subject_id, identity_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_run_from_empty() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
