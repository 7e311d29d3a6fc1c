//! Shared relationship model types
//!
//! Candidate records are produced fresh each ranking cycle and never mutated
//! after creation. RelationshipEntry records persist across cycles and are
//! owned by the relationship store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of relationship counterpart
///
/// Ord is required: identity resolution groups entries in maps keyed by
/// (display name, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    /// Direct person-to-person relationship
    Person,
    /// Group membership relationship
    Group,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Person => "person",
            CandidateKind::Group => "group",
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(CandidateKind::Person),
            "group" => Ok(CandidateKind::Group),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown candidate kind: {}",
                other
            ))),
        }
    }
}

/// A scored, kind-tagged reference to a potential relationship counterpart
///
/// Produced by the score normalizer from raw provider output. Scores are in
/// [0,1] after normalization. Regenerated from scratch every ranking cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Counterpart kind (person or group)
    pub kind: CandidateKind,
    /// Provider-scoped identifier
    pub id: String,
    /// Normalized score in [0,1]
    pub score: f64,
}

impl Candidate {
    pub fn new(kind: CandidateKind, id: impl Into<String>, score: f64) -> Self {
        Self {
            kind,
            id: id.into(),
            score,
        }
    }

    /// Deduplication key: candidates are distinct per (kind, id)
    pub fn dedup_key(&self) -> (CandidateKind, &str) {
        (self.kind, &self.id)
    }
}

/// Lifecycle status of a relationship entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    /// User-confirmed relationship (added, or present in the backend roster)
    Active,
    /// Surfaced by the ranking but not yet acted on by the user
    Suggested,
    /// User archived the relationship; hidden but not forgotten
    Archived,
    /// Soft-deleted; only hard removal takes it further
    Suggestion,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStatus::Active => "active",
            RelationshipStatus::Suggested => "suggested",
            RelationshipStatus::Archived => "archived",
            RelationshipStatus::Suggestion => "suggestion",
        }
    }

    /// Collision priority: active(3) > suggested(2) > other(1)
    ///
    /// Used when two entries share a display name but have distinct identity
    /// keys; the higher-priority entry survives.
    pub fn collision_priority(&self) -> u8 {
        match self {
            RelationshipStatus::Active => 3,
            RelationshipStatus::Suggested => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RelationshipStatus::Active),
            "suggested" => Ok(RelationshipStatus::Suggested),
            "archived" => Ok(RelationshipStatus::Archived),
            "suggestion" => Ok(RelationshipStatus::Suggestion),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown relationship status: {}",
                other
            ))),
        }
    }
}

/// A relationship entry owned by the relationship store
///
/// Display fields (name, bio) are refreshed on every reconciliation pass;
/// status is mutated only through the status transition controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    /// Resolved unique key; no two entries in the store ever share one
    pub identity_key: String,
    /// Human-readable name shown in the UI
    pub display_name: String,
    /// Short free-text description
    pub bio: String,
    /// Counterpart kind
    pub kind: CandidateKind,
    /// Lifecycle status
    pub status: RelationshipStatus,
    /// Key used to route to the underlying chat page
    pub routing_key: String,
}

impl RelationshipEntry {
    /// Build a suggested entry from a ranking candidate
    ///
    /// Candidates observed in a ranking always land as `suggested`, never
    /// `active`; only an explicit user add promotes them.
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            identity_key: candidate.id.clone(),
            display_name: candidate.id.clone(),
            bio: String::new(),
            kind: candidate.kind,
            status: RelationshipStatus::Suggested,
            routing_key: candidate.id.clone(),
        }
    }

    /// Merge display fields from another observation of the same identity
    ///
    /// Status is deliberately not touched here; see the store's upsert
    /// contract.
    pub fn merge_display_fields(&mut self, other: &RelationshipEntry) {
        if !other.display_name.is_empty() {
            self.display_name = other.display_name.clone();
        }
        if !other.bio.is_empty() {
            self.bio = other.bio.clone();
        }
        if !other.routing_key.is_empty() {
            self.routing_key = other.routing_key.clone();
        }
    }
}
