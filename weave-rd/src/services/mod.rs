//! External service clients
//!
//! Scoring providers and the roster backend are black boxes reached over
//! HTTP. Each is fronted by a trait so the reconciler can be driven by
//! in-process stubs in tests.

pub mod providers;
pub mod roster;

pub use providers::{HttpScoringProvider, ProviderError, ScoringProvider};
pub use roster::{HttpRosterClient, Profile, RosterEntry, RosterSource};
