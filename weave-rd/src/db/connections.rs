//! Relationship persistence
//!
//! Two tables back the store:
//! - `active_connections`: durable record of explicit user adds, written at
//!   add time and read at startup
//! - `relationship_snapshot`: full store snapshot, replaced in one
//!   transaction on every reconciliation write-back

use sqlx::{Row, SqlitePool};
use weave_common::db::ActiveConnectionRow;
use weave_common::{CandidateKind, RelationshipEntry, RelationshipStatus};

use crate::Result;

/// Record an explicit user add (keyed upsert)
pub async fn save_active_connection(
    pool: &SqlitePool,
    subject_id: &str,
    entry: &RelationshipEntry,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO active_connections (subject_id, identity_key, kind, routing_key, created_at)
        VALUES (?, ?, ?, ?, datetime('now'))
        ON CONFLICT(subject_id, identity_key) DO UPDATE SET
            kind = excluded.kind,
            routing_key = excluded.routing_key
        "#,
    )
    .bind(subject_id)
    .bind(&entry.identity_key)
    .bind(entry.kind.as_str())
    .bind(&entry.routing_key)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all persisted connections for a subject
pub async fn load_active_connections(
    pool: &SqlitePool,
    subject_id: &str,
) -> Result<Vec<ActiveConnectionRow>> {
    let rows = sqlx::query(
        r#"
        SELECT subject_id, identity_key, kind, routing_key, created_at
        FROM active_connections
        WHERE subject_id = ?
        ORDER BY identity_key
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ActiveConnectionRow {
            subject_id: row.get("subject_id"),
            identity_key: row.get("identity_key"),
            kind: row.get("kind"),
            routing_key: row.get("routing_key"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Delete a persisted connection after a hard remove
pub async fn delete_active_connection(
    pool: &SqlitePool,
    subject_id: &str,
    identity_key: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM active_connections WHERE subject_id = ? AND identity_key = ?")
        .bind(subject_id)
        .bind(identity_key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Replace the persisted snapshot in one transaction
pub async fn replace_snapshot(
    pool: &SqlitePool,
    subject_id: &str,
    entries: &[RelationshipEntry],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM relationship_snapshot WHERE subject_id = ?")
        .bind(subject_id)
        .execute(&mut *tx)
        .await?;

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO relationship_snapshot
                (subject_id, identity_key, display_name, bio, kind, status, routing_key, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
            "#,
        )
        .bind(subject_id)
        .bind(&entry.identity_key)
        .bind(&entry.display_name)
        .bind(&entry.bio)
        .bind(entry.kind.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.routing_key)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load the persisted snapshot for a subject
pub async fn load_snapshot(pool: &SqlitePool, subject_id: &str) -> Result<Vec<RelationshipEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT identity_key, display_name, bio, kind, status, routing_key
        FROM relationship_snapshot
        WHERE subject_id = ?
        ORDER BY identity_key
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let kind_str: String = row.get("kind");
        let status_str: String = row.get("status");
        let kind: CandidateKind = kind_str.parse()?;
        let status: RelationshipStatus = status_str.parse()?;

        entries.push(RelationshipEntry {
            identity_key: row.get("identity_key"),
            display_name: row.get("display_name"),
            bio: row.get("bio"),
            kind,
            status,
            routing_key: row.get("routing_key"),
        });
    }

    Ok(entries)
}
