//! Notification API endpoints.
//!
//! Notifications live in memory only; the revision id is still reported so clients keep a single
//! envelope shape.

use axum::extract::{Path, State};
use serde::Serialize;

use super::{error, not_found, success, ApiResult};
use crate::events::Notification;
use crate::AppState;

/// Notifications with the unread counter the UI shows in its badge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub marked: usize,
}

/// GET /api/notifications - Notifications in arrival order.
pub async fn list_notifications(State(state): State<AppState>) -> ApiResult<NotificationList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let center = state.events.notifications();

    let items = center.list().await;
    let unread_count = center.unread_count().await;
    success(
        NotificationList {
            items,
            unread_count,
        },
        revision_id,
    )
}

/// GET /api/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>) -> ApiResult<UnreadCount> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let unread_count = state.events.notifications().unread_count().await;
    success(UnreadCount { unread_count }, revision_id)
}

/// POST /api/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Notification> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let center = state.events.notifications();

    // Marking an already-read notification is not an error
    center.mark_read(&id).await;
    match center.get(&id).await {
        Some(notification) => success(notification, revision_id),
        None => error(not_found("Notification", &id), revision_id),
    }
}

/// POST /api/notifications/read-all
pub async fn mark_all_notifications_read(State(state): State<AppState>) -> ApiResult<MarkedRead> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let marked = state.events.notifications().mark_all_read().await;
    success(MarkedRead { marked }, revision_id)
}

/// DELETE /api/notifications/{id}
pub async fn remove_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if state.events.notifications().remove(&id).await {
        success((), revision_id)
    } else {
        error(not_found("Notification", &id), revision_id)
    }
}

/// DELETE /api/notifications - Drop every notification.
pub async fn clear_notifications(State(state): State<AppState>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    state.events.notifications().clear().await;
    success((), revision_id)
}
