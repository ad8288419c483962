//! Sponsor activation API endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, not_found, split_ids, success, ApiResult, StatsQuery};
use crate::models::{
    Activation, ActivationEvidence, ActivationFilter, ActivationStats, AddEvidenceRequest,
    CreateActivationRequest, EvidenceCheck, EvidenceReceipt, UpdateActivationRequest,
    UpdateActivationStatusRequest,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceCountsQuery {
    /// Comma-separated activation ids
    #[serde(default)]
    pub ids: Option<String>,
}

/// GET /api/activations - List activations.
pub async fn list_activations(
    State(state): State<AppState>,
    Query(filter): Query<ActivationFilter>,
) -> ApiResult<Vec<Activation>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.list(&filter).await {
        Ok(activations) => success(activations, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/activations/{id} - Get a single activation.
pub async fn get_activation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Activation> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.get(&id).await {
        Ok(Some(activation)) => success(activation, revision_id),
        Ok(None) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/activations - Create a pending activation.
pub async fn create_activation(
    State(state): State<AppState>,
    Json(request): Json<CreateActivationRequest>,
) -> ApiResult<Activation> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.create(request).await {
        Ok(activation) => {
            if let Err(e) = state.search.index_activation(&activation).await {
                tracing::warn!("Failed to index activation: {}", e);
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(activation, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/activations/{id} - Edit activation fields.
pub async fn update_activation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateActivationRequest>,
) -> ApiResult<Activation> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.update(&id, request).await {
        Ok(Some(activation)) => {
            if let Err(e) = state.search.index_activation(&activation).await {
                tracing::warn!("Failed to re-index activation: {}", e);
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(activation, new_revision)
        }
        Ok(None) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/activations/{id} - Delete an activation and its evidence.
pub async fn delete_activation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.delete(&id).await {
        Ok(true) => {
            if let Err(e) = state.search.remove(&id).await {
                tracing::warn!("Failed to remove activation from index: {}", e);
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Ok(false) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/activations/{id}/status - Set the status explicitly.
pub async fn update_activation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateActivationStatusRequest>,
) -> ApiResult<Activation> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .activations
        .update_status(&id, request.status, &request.actor_id)
        .await
    {
        Ok(Some(activation)) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(activation, new_revision)
        }
        Ok(None) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/activations/{id}/evidence - Evidence attached to an activation.
pub async fn list_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ActivationEvidence>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.evidence.list(&id).await {
        Ok(Some(evidence)) => success(evidence, revision_id),
        Ok(None) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/activations/{id}/evidence - Attach evidence and re-evaluate the activation.
pub async fn add_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddEvidenceRequest>,
) -> ApiResult<EvidenceReceipt> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.evidence.add(&id, request).await {
        Ok(Some(receipt)) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(receipt, new_revision)
        }
        Ok(None) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/activations/{id}/evidence-check - Re-run the evidence rules.
pub async fn check_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EvidenceCheck> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.on_evidence_changed(&id).await {
        Ok(Some(check)) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(check, new_revision)
        }
        Ok(None) => error(not_found("Activation", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/activations/stats - Activation figures, optionally for one event.
pub async fn activation_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<ActivationStats> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.activations.stats(query.event_id.as_deref()).await {
        Ok(stats) => success(stats, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/activations/evidence-counts - Evidence count per activation id.
pub async fn evidence_counts(
    State(state): State<AppState>,
    Query(query): Query<EvidenceCountsQuery>,
) -> ApiResult<BTreeMap<String, i64>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let ids = split_ids(query.ids.as_deref());

    match state.activations.evidence_counts(&ids).await {
        Ok(counts) => success(counts, revision_id),
        Err(e) => error(e, revision_id),
    }
}
