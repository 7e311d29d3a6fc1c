//! # Weave Relationship Director (weave-rd)
//!
//! Turns two independent scoring providers' outputs into one ranking and
//! continuously reconciles that ranking, plus the backend-authoritative
//! roster, against the locally-owned relationship list.
//!
//! Component layering (leaves first):
//! - `ranking`: score normalization and rank combining
//! - `store`: the relationship store and status transition controller
//! - `services`: scoring provider and roster HTTP clients
//! - `reconciler`: the periodic merge engine and its scheduler
//! - `api`: HTTP surface (REST + SSE)

pub mod api;
pub mod db;
pub mod error;
pub mod ranking;
pub mod reconciler;
pub mod services;
pub mod state;
pub mod store;

pub use error::{Error, Result};
