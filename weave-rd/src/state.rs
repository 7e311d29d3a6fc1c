//! Shared application state
//!
//! Thread-safe state handed to every API handler. The store and controller
//! are shared with the reconciler task; all writes funnel through the
//! store's single write lock.

use std::sync::Arc;
use weave_common::events::EventBus;

use crate::reconciler::{ReconcileTrigger, Reconciler};
use crate::store::{RelationshipStore, StatusController};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Subject user this director instance serves
    pub subject_id: String,
    /// The relationship store
    pub store: Arc<RelationshipStore>,
    /// Status transition controller
    pub controller: Arc<StatusController>,
    /// Merge engine (read access: latest ranking)
    pub reconciler: Arc<Reconciler>,
    /// Out-of-band reconcile trigger
    pub trigger: ReconcileTrigger,
    /// Event broadcaster for SSE
    pub event_bus: EventBus,
    /// Database pool for connection persistence
    pub db: sqlx::SqlitePool,
    /// Server port
    pub port: u16,
}
