//! REST API implementation for the Relationship Director

pub mod relationships;
pub mod sse;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Relationship list and explicit add
                .route("/relationships", get(relationships::get_relationships))
                .route("/relationships/add", post(relationships::add_relationship))
                // Status transitions
                .route(
                    "/relationships/:identity_key/archive",
                    post(relationships::archive),
                )
                .route(
                    "/relationships/:identity_key/unarchive",
                    post(relationships::unarchive),
                )
                .route(
                    "/relationships/:identity_key/delete",
                    post(relationships::soft_delete),
                )
                // Hard removal
                .route(
                    "/relationships/:identity_key",
                    delete(relationships::remove),
                )
                // Latest combined ranking
                .route("/ranking", get(relationships::get_ranking))
                // Manual reconcile trigger
                .route("/reconcile", post(relationships::trigger_reconcile))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "weave-rd",
        "version": env!("CARGO_PKG_VERSION"),
        "subject_id": state.subject_id,
        "port": state.port,
    }))
}
