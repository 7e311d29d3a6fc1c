//! HTTP request handlers for the relationship list

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use weave_common::{Candidate, CandidateKind, RelationshipEntry, RelationshipStatus};

use crate::db::connections;
use crate::reconciler::synthesize_identity_key;
use crate::state::AppState;
use crate::{Error, Result};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Optional status filter (active, suggested, archived, suggestion)
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RelationshipsResponse {
    pub relationships: Vec<RelationshipEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    /// Identity key; synthesized from the display name when absent
    pub identity_key: Option<String>,
    pub display_name: String,
    pub kind: CandidateKind,
    #[serde(default)]
    pub bio: String,
    /// Chat routing key; derived when absent
    pub routing_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub status: String,
    pub identity_key: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub ranking: Vec<Candidate>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/relationships?status=
pub async fn get_relationships(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RelationshipsResponse>> {
    let filter = match query.status.as_deref() {
        Some(s) => Some(
            s.parse::<RelationshipStatus>()
                .map_err(|e| Error::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let relationships = state.store.get(filter).await;
    Ok(Json(RelationshipsResponse { relationships }))
}

/// POST /api/v1/relationships/add
///
/// The explicit user add: the only way a brand-new relationship becomes
/// active. Persists the connection and nudges the reconciler.
pub async fn add_relationship(
    State(state): State<AppState>,
    Json(request): Json<AddRequest>,
) -> Result<Json<AddResponse>> {
    if request.display_name.is_empty() && request.identity_key.is_none() {
        return Err(Error::BadRequest(
            "either identity_key or display_name is required".to_string(),
        ));
    }

    let identity_key = request
        .identity_key
        .unwrap_or_else(|| synthesize_identity_key(&request.display_name));

    // Direct chats route through a page keyed by both participants
    let routing_key = request.routing_key.unwrap_or_else(|| match request.kind {
        CandidateKind::Person => format!("{}_{}", state.subject_id, identity_key),
        CandidateKind::Group => identity_key.clone(),
    });

    let entry = RelationshipEntry {
        identity_key: identity_key.clone(),
        display_name: if request.display_name.is_empty() {
            identity_key.clone()
        } else {
            request.display_name
        },
        bio: request.bio,
        kind: request.kind,
        status: RelationshipStatus::Active,
        routing_key,
    };

    state.controller.add(entry.clone()).await?;
    connections::save_active_connection(&state.db, &state.subject_id, &entry).await?;

    info!(identity_key = %identity_key, kind = %entry.kind, "Relationship added via API");

    Ok(Json(AddResponse {
        status: "added".to_string(),
        identity_key,
    }))
}

/// POST /api/v1/relationships/:identity_key/archive
pub async fn archive(
    State(state): State<AppState>,
    Path(identity_key): Path<String>,
) -> Result<Json<StatusResponse>> {
    state.controller.archive(&identity_key).await?;
    Ok(Json(StatusResponse {
        status: "archived".to_string(),
    }))
}

/// POST /api/v1/relationships/:identity_key/unarchive
pub async fn unarchive(
    State(state): State<AppState>,
    Path(identity_key): Path<String>,
) -> Result<Json<StatusResponse>> {
    state.controller.unarchive(&identity_key).await?;
    Ok(Json(StatusResponse {
        status: "active".to_string(),
    }))
}

/// POST /api/v1/relationships/:identity_key/delete (soft)
pub async fn soft_delete(
    State(state): State<AppState>,
    Path(identity_key): Path<String>,
) -> Result<Json<StatusResponse>> {
    state.controller.soft_delete(&identity_key).await?;
    Ok(Json(StatusResponse {
        status: "suggestion".to_string(),
    }))
}

/// DELETE /api/v1/relationships/:identity_key (hard)
pub async fn remove(
    State(state): State<AppState>,
    Path(identity_key): Path<String>,
) -> Result<Json<StatusResponse>> {
    state.controller.remove(&identity_key).await?;
    connections::delete_active_connection(&state.db, &state.subject_id, &identity_key).await?;
    Ok(Json(StatusResponse {
        status: "removed".to_string(),
    }))
}

/// GET /api/v1/ranking
///
/// The last successfully computed combined ranking; empty before the first
/// completed ranking fetch.
pub async fn get_ranking(State(state): State<AppState>) -> Json<RankingResponse> {
    let ranking = state.reconciler.latest_ranking().await.unwrap_or_default();
    Json(RankingResponse { ranking })
}

/// POST /api/v1/reconcile
pub async fn trigger_reconcile(State(state): State<AppState>) -> Json<StatusResponse> {
    state.trigger.trigger("manual");
    Json(StatusResponse {
        status: "triggered".to_string(),
    })
}
