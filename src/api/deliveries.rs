//! Delivery board API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{error, not_found, success, ApiResult};
use crate::errors::AppError;
use crate::events::Notification;
use crate::models::{
    CreateCommentRequest, CreateDeliveryRequest, Delivery, DeliveryComment, DeliveryFilter,
    DeliveryStats, DeliveryView, KanbanColumn, MoveDeliveryRequest, UpdateDeliveryRequest,
};
use crate::workflow::{MoveOutcome, UPCOMING_WINDOW_DAYS};
use crate::AppState;

/// Result of a board move.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub delivery: DeliveryView,
    /// False when the delivery already sat in the target column
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<DeliveryComment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    #[serde(default)]
    pub newest_first: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default)]
    pub event_id: Option<String>,
}

/// GET /api/deliveries - List deliveries, highest priority first.
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(filter): Query<DeliveryFilter>,
) -> ApiResult<Vec<DeliveryView>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.list(&filter).await {
        Ok(deliveries) => success(views(deliveries), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/deliveries/{id} - Get a single delivery.
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeliveryView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.get(&id).await {
        Ok(Some(delivery)) => success(delivery.view(Utc::now()), revision_id),
        Ok(None) => error(not_found("Delivery", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/deliveries - Create a delivery in the pending column.
pub async fn create_delivery(
    State(state): State<AppState>,
    Json(request): Json<CreateDeliveryRequest>,
) -> ApiResult<DeliveryView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.create(request).await {
        Ok(delivery) => {
            if let Err(e) = state.search.index_delivery(&delivery).await {
                tracing::warn!("Failed to index delivery: {}", e);
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(delivery.view(Utc::now()), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/deliveries/{id} - Edit delivery fields.
pub async fn update_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDeliveryRequest>,
) -> ApiResult<DeliveryView> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.update(&id, request).await {
        Ok(Some(delivery)) => {
            if let Err(e) = state.search.index_delivery(&delivery).await {
                tracing::warn!("Failed to re-index delivery: {}", e);
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(delivery.view(Utc::now()), new_revision)
        }
        Ok(None) => error(not_found("Delivery", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/deliveries/{id} - Delete a delivery and its comments.
pub async fn delete_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.delete(&id).await {
        Ok(true) => {
            if let Err(e) = state.search.remove(&id).await {
                tracing::warn!("Failed to remove delivery from index: {}", e);
            }
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Ok(false) => error(not_found("Delivery", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/deliveries/{id}/move - Move a delivery to another board column.
pub async fn move_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MoveDeliveryRequest>,
) -> ApiResult<MoveResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(column) = KanbanColumn::parse(&request.column) else {
        return error(
            AppError::Validation(format!("Unknown board column: {}", request.column)),
            revision_id,
        );
    };

    match state
        .deliveries
        .move_delivery(&id, column, &request.actor_id)
        .await
    {
        Ok(Some(MoveOutcome::Moved {
            delivery,
            comment,
            notification,
        })) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(
                MoveResponse {
                    delivery: delivery.view(Utc::now()),
                    changed: true,
                    comment: Some(comment),
                    notification,
                },
                new_revision,
            )
        }
        Ok(Some(MoveOutcome::Unchanged(delivery))) => success(
            MoveResponse {
                delivery: delivery.view(Utc::now()),
                changed: false,
                comment: None,
                notification: None,
            },
            revision_id,
        ),
        Ok(Some(MoveOutcome::Refused { from, to })) => error(
            AppError::TransitionRefused(format!(
                "Cannot move a delivery from {} to {}",
                from.label(),
                to.label()
            )),
            revision_id,
        ),
        Ok(None) => error(not_found("Delivery", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/deliveries/{id}/comments - Comment history, oldest first unless asked otherwise.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> ApiResult<Vec<DeliveryComment>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.comments(&id, query.newest_first).await {
        Ok(Some(comments)) => success(comments, revision_id),
        Ok(None) => error(not_found("Delivery", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/deliveries/{id}/comments - Add a user comment.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<DeliveryComment> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.add_comment(&id, request).await {
        Ok(Some(comment)) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(comment, new_revision)
        }
        Ok(None) => error(not_found("Delivery", &id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/deliveries/late - Open deliveries past their deadline.
pub async fn late_deliveries(State(state): State<AppState>) -> ApiResult<Vec<DeliveryView>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.late(Utc::now()).await {
        Ok(deliveries) => success(views(deliveries), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/deliveries/upcoming - Open deliveries due soon.
pub async fn upcoming_deliveries(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Vec<DeliveryView>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let days = query.days.unwrap_or(UPCOMING_WINDOW_DAYS);

    match state.deliveries.upcoming(Utc::now(), days).await {
        Ok(deliveries) => success(views(deliveries), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/deliveries/pending-approvals - Deliveries waiting in review.
pub async fn pending_approvals(State(state): State<AppState>) -> ApiResult<Vec<DeliveryView>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.deliveries.pending_approvals().await {
        Ok(deliveries) => success(views(deliveries), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/deliveries/stats - Board figures, optionally for one event.
pub async fn delivery_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<DeliveryStats> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .deliveries
        .stats(query.event_id.as_deref(), Utc::now())
        .await
    {
        Ok(stats) => success(stats, revision_id),
        Err(e) => error(e, revision_id),
    }
}

fn views(deliveries: Vec<Delivery>) -> Vec<DeliveryView> {
    let now = Utc::now();
    deliveries
        .into_iter()
        .map(|delivery| delivery.view(now))
        .collect()
}
