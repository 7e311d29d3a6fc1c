//! Score Normalizer
//!
//! Converts each provider's raw candidate list (ordered or explicitly
//! scored) into a uniform [0,1]-scored list.
//!
//! A list is treated as explicitly scored only if every element carries a
//! score; otherwise it is treated as position-ranked and the item at
//! zero-based rank i of n receives `1 - i/n`. Malformed or empty input
//! yields an empty output; the normalizer never errors.

use serde::{Deserialize, Serialize};
use tracing::debug;
use weave_common::{Candidate, CandidateKind};

/// Raw candidate element as decoded from a provider payload
///
/// Providers differ in which identifier field they populate; ingestion
/// resolves them into one `id` here, so downstream code never does
/// field-presence checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    /// Provider-scoped identifier
    #[serde(alias = "user", alias = "group")]
    pub id: String,
    /// Explicit score, when the provider produces one
    #[serde(default)]
    pub score: Option<f64>,
}

/// Normalize one provider's raw list into [0,1]-scored candidates
///
/// `kind` is the provider's declared candidate kind; every output candidate
/// is tagged with it.
pub fn normalize_provider_list(raw: &[RawCandidate], kind: CandidateKind) -> Vec<Candidate> {
    // Elements without an identifier cannot participate in deduplication
    let usable: Vec<&RawCandidate> = raw.iter().filter(|c| !c.id.is_empty()).collect();

    if usable.is_empty() {
        return Vec::new();
    }

    let explicitly_scored = usable.iter().all(|c| c.score.is_some());

    let candidates: Vec<Candidate> = if explicitly_scored {
        usable
            .iter()
            .map(|c| Candidate::new(kind, c.id.clone(), c.score.unwrap_or(0.0)))
            .collect()
    } else {
        // Position-ranked: best item scores 1.0, strictly decreasing
        let n = usable.len() as f64;
        usable
            .iter()
            .enumerate()
            .map(|(i, c)| Candidate::new(kind, c.id.clone(), 1.0 - (i as f64) / n))
            .collect()
    };

    debug!(
        kind = %kind,
        input_count = raw.len(),
        output_count = candidates.len(),
        explicitly_scored,
        "Normalized provider list"
    );

    candidates
}
