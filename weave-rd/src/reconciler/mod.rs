//! Reconciler
//!
//! Brings the relationship store into agreement with the latest combined
//! ranking and the latest authoritative roster snapshot, without discarding
//! local user intent.
//!
//! Per cycle:
//! 1. Fetch and combine both providers' rankings (unavailable provider →
//!    fall back to the last good ranking and skip every ranking-derived
//!    mutation this cycle; malformed output → empty list for that provider
//!    while the other still participates)
//! 2. Fetch the roster (failure → skip the roster step this cycle)
//! 3. Merge into the live store under the write lock, as one atomic replace
//! 4. Persist the merged snapshot
//!
//! Every failure is cycle-local; the next scheduled cycle retries from
//! scratch.

pub mod identity;
pub mod scheduler;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use weave_common::events::{EventBus, WeaveEvent};
use weave_common::{Candidate, CandidateKind, RelationshipEntry, RelationshipStatus};

use crate::db::connections;
use crate::ranking::{combine_rankings, normalize_provider_list};
use crate::services::{Profile, ProviderError, RosterEntry, RosterSource, ScoringProvider};
use crate::store::RelationshipStore;
use crate::{Error, Result};

pub use identity::{synthesize_identity_key, IdentityResolution, NameKindCollisionResolver};
pub use scheduler::{spawn_reconciler, ReconcileTrigger, ReconcilerHandle};

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    /// Entries in the store after the merge
    pub entry_count: usize,
    /// Whether ranking-derived mutations were applied
    pub ranking_applied: bool,
    /// Whether roster-derived mutations were applied
    pub roster_applied: bool,
}

/// The merge engine folding rankings and roster into the store
pub struct Reconciler {
    subject_id: String,
    store: Arc<RelationshipStore>,
    person_provider: Arc<dyn ScoringProvider>,
    group_provider: Arc<dyn ScoringProvider>,
    roster: Arc<dyn RosterSource>,
    resolver: Box<dyn IdentityResolution>,
    event_bus: EventBus,
    db: Option<sqlx::SqlitePool>,
    /// Last successfully computed combined ranking
    last_ranking: Mutex<Option<Vec<Candidate>>>,
}

impl Reconciler {
    pub fn new(
        subject_id: impl Into<String>,
        store: Arc<RelationshipStore>,
        person_provider: Arc<dyn ScoringProvider>,
        group_provider: Arc<dyn ScoringProvider>,
        roster: Arc<dyn RosterSource>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            store,
            person_provider,
            group_provider,
            roster,
            resolver: Box::new(NameKindCollisionResolver),
            event_bus,
            db: None,
            last_ranking: Mutex::new(None),
        }
    }

    /// Enable snapshot persistence through the given pool
    pub fn with_persistence(mut self, pool: sqlx::SqlitePool) -> Self {
        self.db = Some(pool);
        self
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Last successfully computed combined ranking, if any
    pub async fn latest_ranking(&self) -> Option<Vec<Candidate>> {
        self.last_ranking.lock().await.clone()
    }

    /// Seed the store from persisted state on startup
    ///
    /// The snapshot restores the full entry set; persisted active
    /// connections are re-asserted as active on top, in case the snapshot
    /// predates an add.
    pub async fn bootstrap(&self) -> Result<()> {
        let Some(pool) = &self.db else {
            return Ok(());
        };

        let snapshot = connections::load_snapshot(pool, &self.subject_id).await?;
        for entry in snapshot {
            self.store.upsert(entry).await;
        }

        let conns = connections::load_active_connections(pool, &self.subject_id).await?;
        let count = conns.len();
        for conn in conns {
            match self.store.get_entry(&conn.identity_key).await {
                Some(existing) => {
                    // Archived and soft-deleted survive a restart untouched
                    if existing.status == RelationshipStatus::Suggested {
                        self.store
                            .set_status(&conn.identity_key, RelationshipStatus::Active)
                            .await?;
                    }
                }
                None => {
                    let kind: CandidateKind = conn.kind.parse().unwrap_or(CandidateKind::Person);
                    self.store
                        .upsert(RelationshipEntry {
                            identity_key: conn.identity_key.clone(),
                            display_name: conn.identity_key.clone(),
                            bio: String::new(),
                            kind,
                            status: RelationshipStatus::Active,
                            routing_key: conn.routing_key,
                        })
                        .await;
                }
            }
        }

        debug!(
            subject_id = %self.subject_id,
            entries = self.store.len().await,
            connections = count,
            "Store bootstrapped from persistence"
        );
        Ok(())
    }

    /// Run one reconciliation cycle
    ///
    /// `cancel` is checked before the store write and before persistence; a
    /// cancelled cycle applies nothing.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome> {
        // Step A: ranking fetch. Failure aborts only this step.
        let ranking = match self.fetch_combined_ranking().await {
            Ok(candidates) => {
                let _ = self.event_bus.emit(WeaveEvent::RankingComputed {
                    subject_id: self.subject_id.clone(),
                    candidate_count: candidates.len(),
                    timestamp: chrono::Utc::now(),
                });
                *self.last_ranking.lock().await = Some(candidates.clone());
                Some(candidates)
            }
            Err(e) => {
                warn!(
                    subject_id = %self.subject_id,
                    error = %e,
                    "Ranking fetch failed; falling back to last good ranking"
                );
                None
            }
        };

        // Step B: roster fetch. Failure skips the roster step only.
        let roster = match self.roster.get_authoritative_roster(&self.subject_id).await {
            Ok(entries) => {
                let _ = self.event_bus.emit(WeaveEvent::RosterFetched {
                    subject_id: self.subject_id.clone(),
                    entry_count: entries.len(),
                    timestamp: chrono::Utc::now(),
                });
                Some(entries)
            }
            Err(e) => {
                warn!(
                    subject_id = %self.subject_id,
                    error = %e,
                    "Roster fetch failed; skipping roster step this cycle"
                );
                None
            }
        };

        // Profiles are enrichment only; a failed fetch degrades display
        // fields, never the merge
        let profiles = self.roster.get_all_profiles().await.unwrap_or_default();

        if cancel.is_cancelled() {
            return Err(Error::Internal("cycle cancelled before write".to_string()));
        }

        // Merge under the write lock so per-identity status is read at
        // write time, not from a cycle-start snapshot
        let entry_count = self
            .store
            .replace_all_with(|current| {
                merge_entries(
                    current,
                    ranking.as_deref(),
                    roster.as_deref(),
                    &profiles,
                    &self.subject_id,
                    self.resolver.as_ref(),
                )
            })
            .await;

        if let Some(pool) = &self.db {
            if cancel.is_cancelled() {
                return Err(Error::Internal(
                    "cycle cancelled before persistence".to_string(),
                ));
            }
            let snapshot = self.store.snapshot().await;
            if let Err(e) = connections::replace_snapshot(pool, &self.subject_id, &snapshot).await {
                warn!(error = %e, "Snapshot persistence failed; store state remains authoritative");
            }
        }

        let outcome = CycleOutcome {
            entry_count,
            ranking_applied: ranking.is_some(),
            roster_applied: roster.is_some(),
        };

        let _ = self.event_bus.emit(WeaveEvent::ReconcileCompleted {
            entry_count: outcome.entry_count,
            ranking_applied: outcome.ranking_applied,
            roster_applied: outcome.roster_applied,
            timestamp: chrono::Utc::now(),
        });

        debug!(
            subject_id = %self.subject_id,
            entry_count = outcome.entry_count,
            ranking_applied = outcome.ranking_applied,
            roster_applied = outcome.roster_applied,
            "Reconciliation cycle complete"
        );

        Ok(outcome)
    }

    /// Fetch both providers and combine into one ranking
    ///
    /// An unavailable provider fails the whole step (the caller falls back
    /// to the last good ranking); a provider returning malformed output is
    /// treated as an empty list while the other still participates.
    async fn fetch_combined_ranking(&self) -> Result<Vec<Candidate>> {
        let subjects = vec![self.subject_id.clone()];

        let (person_raw, group_raw) = tokio::join!(
            self.person_provider.rank(&subjects),
            self.group_provider.rank(&subjects)
        );

        let person_list = Self::unwrap_provider_result(person_raw, &self.subject_id)?;
        let group_list = Self::unwrap_provider_result(group_raw, &self.subject_id)?;

        let person_normalized =
            normalize_provider_list(&person_list, self.person_provider.kind());
        let group_normalized = normalize_provider_list(&group_list, self.group_provider.kind());

        Ok(combine_rankings(&person_normalized, &group_normalized))
    }

    fn unwrap_provider_result(
        result: std::result::Result<HashMap<String, Vec<crate::ranking::RawCandidate>>, ProviderError>,
        subject_id: &str,
    ) -> Result<Vec<crate::ranking::RawCandidate>> {
        match result {
            Ok(mut map) => Ok(map.remove(subject_id).unwrap_or_default()),
            Err(ProviderError::Malformed(name, msg)) => {
                warn!(provider = %name, error = %msg, "Malformed provider output treated as empty");
                Ok(Vec::new())
            }
            Err(e @ ProviderError::Unavailable(..)) => {
                Err(Error::ProviderUnavailable(e.to_string()))
            }
        }
    }
}

/// Merge current entries with ranking candidates and roster entries
///
/// Pure function over the inputs; called under the store's write lock.
fn merge_entries(
    current: &BTreeMap<String, RelationshipEntry>,
    ranking: Option<&[Candidate]>,
    roster: Option<&[RosterEntry]>,
    profiles: &[Profile],
    subject_id: &str,
    resolver: &dyn IdentityResolution,
) -> BTreeMap<String, RelationshipEntry> {
    let mut merged = current.clone();

    let profile_map: HashMap<(CandidateKind, &str), &Profile> = profiles
        .iter()
        .map(|p| ((p.kind, p.id.as_str()), p))
        .collect();

    if let Some(candidates) = ranking {
        let ranked: HashSet<(CandidateKind, &str)> =
            candidates.iter().map(|c| c.dedup_key()).collect();

        // Ranking candidates not yet in the store land as suggested.
        // Presence is judged by (kind, id), the same key discipline the
        // combiner and the pruning below use; an id can be reused across
        // kinds by independent providers.
        for candidate in candidates {
            if candidate.id == subject_id {
                continue;
            }
            match merged.get(&candidate.id) {
                Some(existing) if existing.kind == candidate.kind => {}
                Some(existing) if existing.status == RelationshipStatus::Suggested => {
                    // Stale cross-kind suggestion holds the key; it would be
                    // pruned below, so the fresh candidate takes it now
                    merged.insert(
                        candidate.id.clone(),
                        RelationshipEntry::from_candidate(candidate),
                    );
                }
                Some(_) => {
                    // A user-intent entry owns the key; the cross-kind
                    // suggestion is dropped, identically every cycle
                }
                None => {
                    merged.insert(
                        candidate.id.clone(),
                        RelationshipEntry::from_candidate(candidate),
                    );
                }
            }
        }

        // Stale-suggestion pruning; active, archived and soft-deleted
        // entries are never pruned by ranking absence
        merged.retain(|key, entry| {
            entry.status != RelationshipStatus::Suggested
                || ranked.contains(&(entry.kind, key.as_str()))
        });
    }

    if let Some(roster_entries) = roster {
        for roster_entry in roster_entries {
            if roster_entry.identity == subject_id {
                continue;
            }
            match merged.get_mut(&roster_entry.identity) {
                Some(entry) => {
                    // Archived survives roster presence; reactivation
                    // requires an explicit unarchive
                    if entry.status != RelationshipStatus::Archived {
                        entry.status = RelationshipStatus::Active;
                    }
                    if !roster_entry.routing_key.is_empty() {
                        entry.routing_key = roster_entry.routing_key.clone();
                    }
                }
                None => {
                    merged.insert(
                        roster_entry.identity.clone(),
                        RelationshipEntry {
                            identity_key: roster_entry.identity.clone(),
                            display_name: roster_entry.identity.clone(),
                            bio: String::new(),
                            kind: roster_entry.kind,
                            status: RelationshipStatus::Active,
                            routing_key: roster_entry.routing_key.clone(),
                        },
                    );
                }
            }
        }
    }

    // Display-field refresh for every entry with a known profile
    for entry in merged.values_mut() {
        if let Some(profile) = profile_map.get(&(entry.kind, entry.identity_key.as_str())) {
            if !profile.name.is_empty() {
                entry.display_name = profile.name.clone();
            }
            if !profile.bio.is_empty() {
                entry.bio = profile.bio.clone();
            }
        }
    }

    resolver.resolve(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(kind: CandidateKind, id: &str, score: f64) -> Candidate {
        Candidate::new(kind, id, score)
    }

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

    fn as_map(entries: Vec<RelationshipEntry>) -> BTreeMap<String, RelationshipEntry> {
        entries
            .into_iter()
            .map(|e| (e.identity_key.clone(), e))
            .collect()
    }

    fn merge(
        current: Vec<RelationshipEntry>,
        ranking: Option<Vec<Candidate>>,
        roster: Option<Vec<RosterEntry>>,
        profiles: Vec<Profile>,
    ) -> BTreeMap<String, RelationshipEntry> {
        merge_entries(
            &as_map(current),
            ranking.as_deref(),
            roster.as_deref(),
            &profiles,
            "me",
            &NameKindCollisionResolver,
        )
    }

    #[test]
    fn test_new_ranking_candidates_inserted_suggested() {
        let merged = merge(
            vec![],
            Some(vec![candidate(CandidateKind::Person, "u1", 0.9)]),
            None,
            vec![],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["u1"].status, RelationshipStatus::Suggested);
    }

    #[test]
    fn test_subject_never_suggested_to_itself() {
        let merged = merge(
            vec![],
            Some(vec![candidate(CandidateKind::Person, "me", 1.0)]),
            None,
            vec![],
        );
        assert!(merged.is_empty());
    }

    #[test]
    fn test_stale_suggested_pruned() {
        let merged = merge(
            vec![entry("u1", "Jake", RelationshipStatus::Suggested)],
            Some(vec![candidate(CandidateKind::Person, "u2", 0.5)]),
            None,
            vec![],
        );
        assert!(!merged.contains_key("u1"));
        assert!(merged.contains_key("u2"));
    }

    #[test]
    fn test_active_never_pruned_by_ranking_absence() {
        // No silent demotion: active entry absent from a fresh ranking stays
        let merged = merge(
            vec![entry("u1", "Jake", RelationshipStatus::Active)],
            Some(vec![candidate(CandidateKind::Person, "u2", 0.5)]),
            None,
            vec![],
        );
        assert_eq!(merged["u1"].status, RelationshipStatus::Active);
    }

    #[test]
    fn test_archived_and_deleted_never_pruned() {
        let merged = merge(
            vec![
                entry("u1", "Jake", RelationshipStatus::Archived),
                entry("u2", "Mia", RelationshipStatus::Suggestion),
            ],
            Some(vec![]),
            None,
            vec![],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_failed_ranking_step_mutates_nothing() {
        let current = vec![entry("u1", "Jake", RelationshipStatus::Suggested)];
        let merged = merge(current.clone(), None, None, vec![]);
        assert_eq!(merged, as_map(current));
    }

    #[test]
    fn test_roster_entry_becomes_active() {
        let merged = merge(
            vec![entry("u1", "Jake", RelationshipStatus::Suggested)],
            None,
            Some(vec![RosterEntry {
                identity: "u1".into(),
                kind: CandidateKind::Person,
                routing_key: "me_u1".into(),
            }]),
            vec![],
        );
        assert_eq!(merged["u1"].status, RelationshipStatus::Active);
        assert_eq!(merged["u1"].routing_key, "me_u1");
    }

    #[test]
    fn test_unknown_roster_entry_inserted_active() {
        let merged = merge(
            vec![],
            None,
            Some(vec![RosterEntry {
                identity: "u7".into(),
                kind: CandidateKind::Person,
                routing_key: "me_u7".into(),
            }]),
            vec![],
        );
        assert_eq!(merged["u7"].status, RelationshipStatus::Active);
    }

    #[test]
    fn test_archived_survives_roster_presence() {
        let merged = merge(
            vec![entry("u1", "Jake", RelationshipStatus::Archived)],
            None,
            Some(vec![RosterEntry {
                identity: "u1".into(),
                kind: CandidateKind::Person,
                routing_key: "me_u1".into(),
            }]),
            vec![],
        );
        assert_eq!(merged["u1"].status, RelationshipStatus::Archived);
    }

    #[test]
    fn test_display_fields_refreshed_from_profiles() {
        let merged = merge(
            vec![entry("u1", "u1", RelationshipStatus::Active)],
            None,
            None,
            vec![Profile {
                id: "u1".into(),
                name: "Jake".into(),
                bio: "climber".into(),
                kind: CandidateKind::Person,
            }],
        );
        assert_eq!(merged["u1"].display_name, "Jake");
        assert_eq!(merged["u1"].bio, "climber");
    }

    #[test]
    fn test_name_collision_resolved_by_priority() {
        let merged = merge(
            vec![
                entry("jake", "Jake", RelationshipStatus::Suggested),
                entry("jake_77xk9", "Jake", RelationshipStatus::Suggested),
            ],
            None,
            None,
            vec![],
        );
        assert_eq!(merged.len(), 1);
        assert!(merged.contains_key("jake_77xk9"));
    }

    #[test]
    fn test_cross_kind_id_reuse_replaces_stale_suggestion() {
        // "x" was suggested by the person provider, which has since dropped
        // it; the group provider now ranks the same id
        let ranking = vec![candidate(CandidateKind::Group, "x", 0.5)];
        let once = merge(
            vec![entry("x", "x", RelationshipStatus::Suggested)],
            Some(ranking.clone()),
            None,
            vec![],
        );
        assert_eq!(once.len(), 1);
        assert_eq!(once["x"].kind, CandidateKind::Group);
        assert_eq!(once["x"].status, RelationshipStatus::Suggested);

        // Identical inputs leave the result untouched
        let twice = merge_entries(
            &once,
            Some(&ranking),
            None,
            &[],
            "me",
            &NameKindCollisionResolver,
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cross_kind_id_reuse_never_displaces_user_intent() {
        let ranking = vec![candidate(CandidateKind::Group, "x", 0.5)];
        let once = merge(
            vec![entry("x", "Jake", RelationshipStatus::Active)],
            Some(ranking.clone()),
            None,
            vec![],
        );
        assert_eq!(once["x"].kind, CandidateKind::Person);
        assert_eq!(once["x"].status, RelationshipStatus::Active);

        let twice = merge_entries(
            &once,
            Some(&ranking),
            None,
            &[],
            "me",
            &NameKindCollisionResolver,
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let ranking = vec![
            candidate(CandidateKind::Person, "u1", 0.9),
            candidate(CandidateKind::Group, "g1", 0.4),
        ];
        let roster = vec![RosterEntry {
            identity: "u2".into(),
            kind: CandidateKind::Person,
            routing_key: "me_u2".into(),
        }];
        let profiles = vec![Profile {
            id: "u1".into(),
            name: "Jake".into(),
            bio: String::new(),
            kind: CandidateKind::Person,
        }];

        let once = merge_entries(
            &BTreeMap::new(),
            Some(&ranking),
            Some(&roster),
            &profiles,
            "me",
            &NameKindCollisionResolver,
        );
        let twice = merge_entries(
            &once,
            Some(&ranking),
            Some(&roster),
            &profiles,
            "me",
            &NameKindCollisionResolver,
        );
        assert_eq!(once, twice);
    }
}
