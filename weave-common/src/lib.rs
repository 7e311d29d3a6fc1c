//! # Weave Common Library
//!
//! Shared code for the Weave services including:
//! - Relationship and candidate model types
//! - Event types (WeaveEvent enum) and EventBus
//! - Configuration loading
//! - Database initialization and migrations
//! - SSE utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod model;
pub mod sse;

pub use error::{Error, Result};
pub use model::{Candidate, CandidateKind, RelationshipEntry, RelationshipStatus};
