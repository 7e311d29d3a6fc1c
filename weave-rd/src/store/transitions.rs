//! Status Transition Controller
//!
//! The state machine for user-initiated status changes:
//!
//! - `active → archived` (archive)
//! - `archived → active` (unarchive)
//! - `active|archived → suggestion` (soft delete, irreversible here)
//! - `suggested → active` (explicit add; the only way a brand-new
//!   relationship becomes active)
//!
//! No direct transition between `suggested` and `archived`. `suggestion`
//! has no outgoing transition other than hard removal. Externally-observed
//! candidates always land `suggested`; that insertion happens in the
//! reconciler, not here.

use std::sync::Arc;
use tracing::info;
use weave_common::events::{EventBus, WeaveEvent};
use weave_common::{RelationshipEntry, RelationshipStatus};

use crate::store::RelationshipStore;
use crate::{Error, Result};

/// Validate a user-initiated status transition
pub fn validate_transition(from: RelationshipStatus, to: RelationshipStatus) -> Result<()> {
    use RelationshipStatus::*;

    let allowed = matches!(
        (from, to),
        (Active, Archived)
            | (Archived, Active)
            | (Active, Suggestion)
            | (Archived, Suggestion)
            | (Suggested, Active)
    );

    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidTransition(format!(
            "{} -> {} is not permitted",
            from, to
        )))
    }
}

/// Applies validated status transitions to the store and broadcasts them
///
/// All writes go through the store's write lock, so a transition taken while
/// a reconciliation cycle is in flight is serialized against the cycle's
/// write-back and never lost.
pub struct StatusController {
    store: Arc<RelationshipStore>,
    event_bus: EventBus,
}

impl StatusController {
    pub fn new(store: Arc<RelationshipStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// `active → archived`
    pub async fn archive(&self, identity_key: &str) -> Result<()> {
        self.transition(identity_key, RelationshipStatus::Archived).await
    }

    /// `archived → active`
    pub async fn unarchive(&self, identity_key: &str) -> Result<()> {
        self.transition(identity_key, RelationshipStatus::Active).await
    }

    /// `active|archived → suggestion` (soft delete)
    pub async fn soft_delete(&self, identity_key: &str) -> Result<()> {
        self.transition(identity_key, RelationshipStatus::Suggestion).await
    }

    /// Explicit add: `suggested → active`
    ///
    /// When the entry is not in the store yet (user added from search before
    /// any ranking surfaced it), it is inserted directly as active.
    pub async fn add(&self, entry: RelationshipEntry) -> Result<()> {
        let identity_key = entry.identity_key.clone();

        match self.store.get_entry(&identity_key).await {
            Some(existing) if existing.status == RelationshipStatus::Active => {
                // Re-add of an already-active relationship is a no-op
                self.store.upsert(entry).await;
            }
            Some(existing) => {
                validate_transition(existing.status, RelationshipStatus::Active)?;
                // Refresh display fields from the add payload before promoting
                self.store.upsert(entry).await;
                let old = self
                    .store
                    .set_status_checked(&identity_key, RelationshipStatus::Active, |from| {
                        validate_transition(from, RelationshipStatus::Active)
                    })
                    .await?;
                self.emit_status_change(&identity_key, old, RelationshipStatus::Active);
            }
            None => {
                let mut new_entry = entry;
                new_entry.status = RelationshipStatus::Active;
                let kind = new_entry.kind;
                self.store.upsert(new_entry).await;
                let _ = self.event_bus.emit(WeaveEvent::RelationshipAdded {
                    identity_key: identity_key.clone(),
                    kind,
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        info!(identity_key = %identity_key, "Relationship added");
        Ok(())
    }

    /// Hard removal; valid from any status
    pub async fn remove(&self, identity_key: &str) -> Result<RelationshipEntry> {
        let removed = self.store.remove(identity_key).await?;
        let _ = self.event_bus.emit(WeaveEvent::RelationshipRemoved {
            identity_key: identity_key.to_string(),
            timestamp: chrono::Utc::now(),
        });
        info!(identity_key = %identity_key, "Relationship removed");
        Ok(removed)
    }

    async fn transition(&self, identity_key: &str, to: RelationshipStatus) -> Result<()> {
        // Validation runs against the live status under the store's write
        // lock; a concurrent transition on the same key cannot slip an edge
        // the table forbids between check and apply
        let old = self
            .store
            .set_status_checked(identity_key, to, |from| validate_transition(from, to))
            .await?;
        self.emit_status_change(identity_key, old, to);
        Ok(())
    }

    fn emit_status_change(
        &self,
        identity_key: &str,
        old_status: RelationshipStatus,
        new_status: RelationshipStatus,
    ) {
        info!(
            identity_key = %identity_key,
            old_status = %old_status,
            new_status = %new_status,
            "Status transition"
        );
        let _ = self.event_bus.emit(WeaveEvent::RelationshipStatusChanged {
            identity_key: identity_key.to_string(),
            old_status,
            new_status,
            timestamp: chrono::Utc::now(),
        });
    }
}
