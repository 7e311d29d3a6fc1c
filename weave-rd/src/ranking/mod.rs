//! Ranking pipeline: score normalization and rank combining
//!
//! Raw provider output is resolved into typed candidates once at ingestion,
//! normalized per provider, then combined into one deduplicated ranking per
//! subject user. Everything in this module is pure and deterministic.

pub mod combiner;
pub mod normalizer;

pub use combiner::combine_rankings;
pub use normalizer::{normalize_provider_list, RawCandidate};
