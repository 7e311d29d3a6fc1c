//! Database models

use serde::{Deserialize, Serialize};

/// Row of the active_connections table
///
/// relationship_snapshot rows have no model struct: readers map them
/// straight into RelationshipEntry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveConnectionRow {
    pub subject_id: String,
    pub identity_key: String,
    pub kind: String,
    pub routing_key: String,
    pub created_at: String,
}
