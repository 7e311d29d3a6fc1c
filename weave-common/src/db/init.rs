//! Database initialization
//!
//! Creates the SQLite database on first run and applies migrations. Safe to
//! call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode: concurrent readers with one writer, which matches the
    // single-writer store discipline
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Run migrations (idempotent - safe to call multiple times)
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Initialize an in-memory database for tests
pub async fn init_test_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_file_and_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("weave.db");

        let pool = init_database(&db_path).await.unwrap();
        drop(pool);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_reopen_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("weave.db");

        let pool = init_database(&db_path).await.unwrap();
        sqlx::query(
            "INSERT INTO active_connections (subject_id, identity_key, kind, routing_key, created_at)
             VALUES ('me', 'u1', 'person', 'me_u1', datetime('now'))",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        // Second open migrates nothing and keeps the data
        let pool = init_database(&db_path).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM active_connections")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
