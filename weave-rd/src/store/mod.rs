//! Relationship Store
//!
//! The authoritative, mutable collection of relationship entries. Exactly
//! one logical writer at a time: every mutation takes the write lock, and
//! the reconciler's write-back is a single atomic replace, so concurrent
//! readers never observe a partially-merged set.
//!
//! Status is never changed by `upsert`; the status transition controller is
//! the only path that mutates it (the reconciler goes through
//! `replace_all_with`, which re-reads live statuses under the lock).

pub mod transitions;

use std::collections::BTreeMap;
use tokio::sync::RwLock;
use weave_common::{RelationshipEntry, RelationshipStatus};

use crate::{Error, Result};

pub use transitions::StatusController;

/// In-memory relationship store with single-writer discipline
///
/// Entries are keyed by identity key; a BTreeMap keeps iteration order
/// deterministic so repeated snapshots of identical state are identical.
pub struct RelationshipStore {
    entries: RwLock<BTreeMap<String, RelationshipEntry>>,
}

impl RelationshipStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get entries, optionally filtered by status, in identity-key order
    pub async fn get(&self, filter: Option<RelationshipStatus>) -> Vec<RelationshipEntry> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| filter.map_or(true, |s| e.status == s))
            .cloned()
            .collect()
    }

    /// Look up a single entry by identity key
    pub async fn get_entry(&self, identity_key: &str) -> Option<RelationshipEntry> {
        self.entries.read().await.get(identity_key).cloned()
    }

    /// Insert if the identity key is absent; otherwise merge display fields
    ///
    /// The stored status is never changed by this operation, whatever status
    /// the incoming entry carries.
    pub async fn upsert(&self, entry: RelationshipEntry) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.identity_key) {
            Some(existing) => existing.merge_display_fields(&entry),
            None => {
                entries.insert(entry.identity_key.clone(), entry);
            }
        }
    }

    /// Set the status of an entry; the only status mutation path
    ///
    /// Returns the previous status.
    pub async fn set_status(
        &self,
        identity_key: &str,
        new_status: RelationshipStatus,
    ) -> Result<RelationshipStatus> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(identity_key)
            .ok_or_else(|| Error::RelationshipNotFound(identity_key.to_string()))?;
        let old_status = entry.status;
        entry.status = new_status;
        Ok(old_status)
    }

    /// Validate and set the status in one write-lock acquisition
    ///
    /// `check` sees the live status while the lock is held; the entry is
    /// untouched when it errors. Two concurrent transitions on the same key
    /// therefore serialize, and the loser is re-validated against the
    /// winner's result instead of its own stale read.
    pub async fn set_status_checked<F>(
        &self,
        identity_key: &str,
        new_status: RelationshipStatus,
        check: F,
    ) -> Result<RelationshipStatus>
    where
        F: FnOnce(RelationshipStatus) -> Result<()>,
    {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(identity_key)
            .ok_or_else(|| Error::RelationshipNotFound(identity_key.to_string()))?;
        check(entry.status)?;
        let old_status = entry.status;
        entry.status = new_status;
        Ok(old_status)
    }

    /// Hard delete; returns the removed entry
    pub async fn remove(&self, identity_key: &str) -> Result<RelationshipEntry> {
        let mut entries = self.entries.write().await;
        entries
            .remove(identity_key)
            .ok_or_else(|| Error::RelationshipNotFound(identity_key.to_string()))
    }

    /// Atomically replace the full entry set
    ///
    /// The closure receives the current entries while the write lock is
    /// held, so merge logic reads per-identity status at write time rather
    /// than from a snapshot captured earlier. A user action taken mid-cycle
    /// is therefore never clobbered by stale data.
    pub async fn replace_all_with<F>(&self, merge: F) -> usize
    where
        F: FnOnce(&BTreeMap<String, RelationshipEntry>) -> BTreeMap<String, RelationshipEntry>,
    {
        let mut entries = self.entries.write().await;
        let merged = merge(&entries);
        *entries = merged;
        entries.len()
    }

    /// Full snapshot in deterministic order
    pub async fn snapshot(&self) -> Vec<RelationshipEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for RelationshipStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::CandidateKind;

    fn entry(key: &str, name: &str, status: RelationshipStatus) -> RelationshipEntry {
        RelationshipEntry {
            identity_key: key.to_string(),
            display_name: name.to_string(),
            bio: String::new(),
            kind: CandidateKind::Person,
            status,
            routing_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_when_absent() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Suggested))
            .await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_never_changes_status() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Archived))
            .await;

        let mut refreshed = entry("u1", "Jake R.", RelationshipStatus::Active);
        refreshed.bio = "new bio".into();
        store.upsert(refreshed).await;

        let stored = store.get_entry("u1").await.unwrap();
        assert_eq!(stored.status, RelationshipStatus::Archived);
        assert_eq!(stored.display_name, "Jake R.");
        assert_eq!(stored.bio, "new bio");
    }

    #[tokio::test]
    async fn test_identity_keys_unique() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Suggested))
            .await;
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Suggested))
            .await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_status_returns_old_status() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Suggested))
            .await;
        let old = store
            .set_status("u1", RelationshipStatus::Active)
            .await
            .unwrap();
        assert_eq!(old, RelationshipStatus::Suggested);
        assert_eq!(
            store.get_entry("u1").await.unwrap().status,
            RelationshipStatus::Active
        );
    }

    #[tokio::test]
    async fn test_set_status_checked_rejects_without_mutation() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Suggestion))
            .await;

        // The check sees the live status, not what the caller read earlier
        let result = store
            .set_status_checked("u1", RelationshipStatus::Archived, |from| {
                assert_eq!(from, RelationshipStatus::Suggestion);
                Err(Error::InvalidTransition("rejected".to_string()))
            })
            .await;
        assert!(matches!(result, Err(Error::InvalidTransition(_))));
        assert_eq!(
            store.get_entry("u1").await.unwrap().status,
            RelationshipStatus::Suggestion
        );

        let old = store
            .set_status_checked("u1", RelationshipStatus::Archived, |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(old, RelationshipStatus::Suggestion);
        assert_eq!(
            store.get_entry("u1").await.unwrap().status,
            RelationshipStatus::Archived
        );
    }

    #[tokio::test]
    async fn test_set_status_unknown_key_errors() {
        let store = RelationshipStore::new();
        let result = store.set_status("ghost", RelationshipStatus::Active).await;
        assert!(matches!(result, Err(Error::RelationshipNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_filters_by_status() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Active))
            .await;
        store
            .upsert(entry("u2", "Mia", RelationshipStatus::Suggested))
            .await;

        let active = store.get(Some(RelationshipStatus::Active)).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].identity_key, "u1");

        let all = store.get(None).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_all_sees_current_state() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("u1", "Jake", RelationshipStatus::Active))
            .await;

        let count = store
            .replace_all_with(|current| {
                // Merge sees u1 with its live status
                assert_eq!(
                    current.get("u1").unwrap().status,
                    RelationshipStatus::Active
                );
                let mut next = current.clone();
                next.insert(
                    "u2".to_string(),
                    entry("u2", "Mia", RelationshipStatus::Suggested),
                );
                next
            })
            .await;

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_snapshot_order_is_deterministic() {
        let store = RelationshipStore::new();
        store
            .upsert(entry("zeta", "Z", RelationshipStatus::Suggested))
            .await;
        store
            .upsert(entry("alpha", "A", RelationshipStatus::Suggested))
            .await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot[0].identity_key, "alpha");
        assert_eq!(snapshot[1].identity_key, "zeta");
    }
}
