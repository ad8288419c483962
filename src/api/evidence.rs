//! Evidence ledger API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, not_found, success, ApiResult};
use crate::models::{ActivationEvidence, EvidenceApprovalRequest};
use crate::AppState;

/// DELETE /api/evidence/{id} - Remove evidence. The activation keeps its status.
pub async fn remove_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.evidence.remove(&id).await {
        Ok(true) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Ok(false) => error(not_found("Evidence", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/evidence/{id}/approval - Approve or reject a piece of evidence.
pub async fn set_evidence_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<EvidenceApprovalRequest>,
) -> ApiResult<ActivationEvidence> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .evidence
        .set_approval(&id, request.approved, &request.actor_id)
        .await
    {
        Ok(Some(evidence)) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(evidence, new_revision)
        }
        Ok(None) => error(not_found("Evidence", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}
