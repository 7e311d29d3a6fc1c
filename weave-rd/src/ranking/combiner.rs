//! Rank Combiner
//!
//! Merges the two normalized candidate lists for one subject into a single
//! deduplicated, descending ranking:
//!
//! 1. Concatenate both lists (empty concatenation → empty ranking)
//! 2. Min-max normalize across the concatenation (denominator 1 when all
//!    scores are equal)
//! 3. Deduplicate by (kind, id), keeping the higher normalized score
//! 4. Stable sort descending; ties keep original insertion order
//!
//! Deterministic for identical inputs; never mutates them.

use std::collections::HashMap;
use tracing::debug;
use weave_common::{Candidate, CandidateKind};

/// Combine the person- and group-provider rankings for one subject
pub fn combine_rankings(person_list: &[Candidate], group_list: &[Candidate]) -> Vec<Candidate> {
    let merged: Vec<&Candidate> = person_list.iter().chain(group_list.iter()).collect();

    if merged.is_empty() {
        return Vec::new();
    }

    let min = merged.iter().map(|c| c.score).fold(f64::INFINITY, f64::min);
    let max = merged
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let denom = if max > min { max - min } else { 1.0 };

    // Deduplicate keeping first-occurrence position and maximum score
    let mut out: Vec<Candidate> = Vec::with_capacity(merged.len());
    let mut index_by_key: HashMap<(CandidateKind, String), usize> = HashMap::new();

    for candidate in merged {
        let normalized = (candidate.score - min) / denom;
        let key = (candidate.kind, candidate.id.clone());

        match index_by_key.get(&key) {
            Some(&idx) => {
                if normalized > out[idx].score {
                    out[idx].score = normalized;
                }
            }
            None => {
                index_by_key.insert(key, out.len());
                out.push(Candidate::new(candidate.kind, candidate.id.clone(), normalized));
            }
        }
    }

    // Stable sort: equal scores keep insertion order
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    debug!(
        person_count = person_list.len(),
        group_count = group_list.len(),
        combined_count = out.len(),
        "Combined rankings"
    );

    out
}
