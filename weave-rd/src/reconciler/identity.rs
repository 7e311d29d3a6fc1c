//! Identity resolution
//!
//! The scoring providers, the roster, and local user actions do not share a
//! key scheme, so two observed entries can name the same counterpart under
//! distinct identity keys. Resolution is id-first (identical keys were
//! already merged by the store), with a display-name + kind fallback for the
//! remainder.
//!
//! Collision winner selection is deterministic: status priority
//! active(3) > suggested(2) > other(1), and on equal priority the entry with
//! the lexically longer identity key survives. The longer-key rule looks odd
//! but synthesized keys (`<name>_<suffix>`) are longer than bare ids and
//! carry more provenance; it is kept for compatibility with observed data.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;
use weave_common::{CandidateKind, RelationshipEntry};

/// Pluggable strategy for collapsing identity collisions
///
/// Input and output are identity-keyed entry maps; the output never contains
/// two entries sharing a (display name, kind) pair.
pub trait IdentityResolution: Send + Sync {
    fn resolve(
        &self,
        entries: BTreeMap<String, RelationshipEntry>,
    ) -> BTreeMap<String, RelationshipEntry>;
}

/// Default resolution: name + kind fallback with the documented tie-break
pub struct NameKindCollisionResolver;

impl NameKindCollisionResolver {
    /// True if `challenger` beats `incumbent` for the same (name, kind)
    fn wins(challenger: &RelationshipEntry, incumbent: &RelationshipEntry) -> bool {
        let p_challenger = challenger.status.collision_priority();
        let p_incumbent = incumbent.status.collision_priority();

        if p_challenger != p_incumbent {
            return p_challenger > p_incumbent;
        }

        // Equal priority: lexically longer identity key survives; equal
        // length falls back to ordering so the outcome never depends on
        // iteration order
        match challenger
            .identity_key
            .len()
            .cmp(&incumbent.identity_key.len())
        {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => challenger.identity_key > incumbent.identity_key,
        }
    }
}

impl IdentityResolution for NameKindCollisionResolver {
    fn resolve(
        &self,
        entries: BTreeMap<String, RelationshipEntry>,
    ) -> BTreeMap<String, RelationshipEntry> {
        let mut best: BTreeMap<(String, CandidateKind), RelationshipEntry> = BTreeMap::new();

        for (_, entry) in entries {
            let name_key = (entry.display_name.clone(), entry.kind);
            match best.get(&name_key) {
                Some(incumbent) => {
                    if Self::wins(&entry, incumbent) {
                        debug!(
                            kept = %entry.identity_key,
                            dropped = %incumbent.identity_key,
                            name = %name_key.0,
                            "Identity collision resolved"
                        );
                        best.insert(name_key, entry);
                    } else {
                        debug!(
                            kept = %incumbent.identity_key,
                            dropped = %entry.identity_key,
                            name = %name_key.0,
                            "Identity collision resolved"
                        );
                    }
                }
                None => {
                    best.insert(name_key, entry);
                }
            }
        }

        best.into_values()
            .map(|e| (e.identity_key.clone(), e))
            .collect()
    }
}

/// Synthesize an identity key for an entry observed without one
///
/// `<name>_<random suffix>`; the suffix makes the key unique and the length
/// makes it win the equal-priority tie-break against bare ids.
pub fn synthesize_identity_key(display_name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}_{}", display_name, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::RelationshipStatus;

    fn entry(
        key: &str,
        name: &str,
        kind: CandidateKind,
        status: RelationshipStatus,
    ) -> RelationshipEntry {
        RelationshipEntry {
            identity_key: key.to_string(),
            display_name: name.to_string(),
            bio: String::new(),
            kind,
            status,
            routing_key: key.to_string(),
        }
    }

    fn resolve(entries: Vec<RelationshipEntry>) -> BTreeMap<String, RelationshipEntry> {
        let map: BTreeMap<String, RelationshipEntry> = entries
            .into_iter()
            .map(|e| (e.identity_key.clone(), e))
            .collect();
        NameKindCollisionResolver.resolve(map)
    }

    #[test]
    fn test_distinct_names_untouched() {
        let resolved = resolve(vec![
            entry("u1", "Jake", CandidateKind::Person, RelationshipStatus::Active),
            entry("u2", "Mia", CandidateKind::Person, RelationshipStatus::Suggested),
        ]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_active_beats_suggested() {
        let resolved = resolve(vec![
            entry("jake_long_key", "Jake", CandidateKind::Person, RelationshipStatus::Suggested),
            entry("u1", "Jake", CandidateKind::Person, RelationshipStatus::Active),
        ]);
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("u1"));
    }

    #[test]
    fn test_equal_priority_longer_key_survives() {
        // Both suggested, named "Jake": "jake_77xk9" outlives "jake"
        let resolved = resolve(vec![
            entry("jake", "Jake", CandidateKind::Person, RelationshipStatus::Suggested),
            entry("jake_77xk9", "Jake", CandidateKind::Person, RelationshipStatus::Suggested),
        ]);
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("jake_77xk9"));
    }

    #[test]
    fn test_same_name_different_kind_no_collision() {
        let resolved = resolve(vec![
            entry("u1", "Fitness", CandidateKind::Person, RelationshipStatus::Suggested),
            entry("g1", "Fitness", CandidateKind::Group, RelationshipStatus::Suggested),
        ]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = vec![
            entry("aa", "Jake", CandidateKind::Person, RelationshipStatus::Suggested),
            entry("bb", "Jake", CandidateKind::Person, RelationshipStatus::Suggested),
        ];
        let first = resolve(a.clone());
        for _ in 0..5 {
            assert_eq!(resolve(a.clone()), first);
        }
        // Equal length keys: lexically greater one survives
        assert!(first.contains_key("bb"));
    }

    #[test]
    fn test_synthesized_key_shape() {
        let key = synthesize_identity_key("Jake");
        assert!(key.starts_with("Jake_"));
        assert_eq!(key.len(), "Jake_".len() + 6);
    }
}
