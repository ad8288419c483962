//! Assignment API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{error, not_found, split_ids, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    AssignmentFilter, ConflictCheckRequest, ConflictPair, CreateAssignmentRequest,
    MemberSchedule, TeamAssignment, UpdateAssignmentRequest,
};
use crate::workflow::AssignmentOutcome;
use crate::AppState;

/// Schedule query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    /// Comma-separated member ids
    #[serde(default)]
    pub member_ids: Option<String>,
}

fn conflict_error(proposed: &TeamAssignment, conflicts: Vec<TeamAssignment>) -> AppError {
    AppError::ScheduleConflict {
        message: format!(
            "Member {} already has {} booking(s) in this window",
            proposed.member_id,
            conflicts.len()
        ),
        conflicts,
    }
}

/// GET /api/assignments - List assignments.
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Vec<TeamAssignment>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.assignments.list(&filter).await {
        Ok(assignments) => success(assignments, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/assignments/{id} - Get a single assignment.
pub async fn get_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamAssignment> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.assignments.get(&id).await {
        Ok(Some(assignment)) => success(assignment, revision_id),
        Ok(None) => error(not_found("Assignment", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/assignments - Book a member.
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(request): Json<CreateAssignmentRequest>,
) -> ApiResult<TeamAssignment> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let member_id = request.member_id.clone();

    match state.assignments.create(request).await {
        Ok(Some(AssignmentOutcome::Saved(assignment))) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(assignment, new_revision)
        }
        Ok(Some(AssignmentOutcome::Conflicted {
            proposed,
            conflicts,
        })) => error(conflict_error(&proposed, conflicts), revision_id),
        Ok(None) => error(not_found("Member", &member_id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/assignments/{id} - Change a booking.
pub async fn update_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAssignmentRequest>,
) -> ApiResult<TeamAssignment> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.assignments.update(&id, request).await {
        Ok(Some(AssignmentOutcome::Saved(assignment))) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(assignment, new_revision)
        }
        Ok(Some(AssignmentOutcome::Conflicted {
            proposed,
            conflicts,
        })) => error(conflict_error(&proposed, conflicts), revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Assignment {} or its member not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/assignments/{id} - Cancel a booking.
pub async fn delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.assignments.delete(&id).await {
        Ok(true) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Ok(false) => error(not_found("Assignment", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/assignments/check - Conflicts a booking would cause, without writing.
pub async fn check_conflicts(
    State(state): State<AppState>,
    Json(request): Json<ConflictCheckRequest>,
) -> ApiResult<Vec<TeamAssignment>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.assignments.check(&request).await {
        Ok(conflicts) => success(conflicts, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/assignments/schedule - Bookings grouped by member.
pub async fn member_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Vec<MemberSchedule>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let member_ids = split_ids(query.member_ids.as_deref());

    match state
        .assignments
        .schedule(query.from, query.to, &member_ids)
        .await
    {
        Ok(schedule) => success(schedule, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/assignments/audit - Overlapping pairs across the schedule.
pub async fn audit_assignments(State(state): State<AppState>) -> ApiResult<Vec<ConflictPair>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.assignments.audit().await {
        Ok(pairs) => success(pairs, revision_id),
        Err(e) => error(e, revision_id),
    }
}
