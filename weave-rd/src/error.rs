//! Error types for weave-rd
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Reconciler-facing kinds are cycle-local: they abort a single
//! merge step, never the recurring schedule.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for the weave-rd module
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Shared library errors
    #[error(transparent)]
    Common(#[from] weave_common::Error),

    /// Scoring provider call failed or timed out
    ///
    /// Malformed provider output never reaches this enum: the reconciler
    /// downgrades it to an empty list at ingestion (ProviderError::Malformed)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Authoritative roster fetch failed
    #[error("Roster fetch failed: {0}")]
    RosterFetch(String),

    /// Status transition not permitted by the state machine
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Requested relationship entry not found
    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using weave-rd Error
pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::RelationshipNotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) | Error::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            Error::ProviderUnavailable(_) | Error::RosterFetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
