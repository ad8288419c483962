//! Delivery board workflow.
//!
//! A board move rewrites status and progress, stamps the publication time, and appends one
//! system comment, all in a single transaction. Events go out only after commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Notification, NotificationKind, NotificationLevel};
use crate::models::{
    is_valid_priority, CreateCommentRequest, CreateDeliveryRequest, Delivery, DeliveryComment,
    DeliveryFilter, DeliveryStats, DeliveryStatus, KanbanColumn, UpdateDeliveryRequest,
};

/// Days ahead that count as an approaching deadline in statistics.
pub const UPCOMING_WINDOW_DAYS: i64 = 3;

/// Result of a board move on an existing delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Moved {
        delivery: Delivery,
        comment: DeliveryComment,
        notification: Option<Notification>,
    },
    /// Target column equals the current one; nothing was written.
    Unchanged(Delivery),
    /// The current status does not allow moving to the target.
    Refused {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
}

/// Published deliveries are final; rejected ones can only be sent back to pending.
pub fn transition_allowed(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    match from {
        DeliveryStatus::Published => false,
        DeliveryStatus::Rejected => to == DeliveryStatus::Pending,
        _ => true,
    }
}

/// Text of the system comment recorded for a status change.
pub fn transition_comment(from: DeliveryStatus, to: DeliveryStatus) -> String {
    format!("Status changed from '{}' to '{}'", from.label(), to.label())
}

fn move_message(title: &str, column: KanbanColumn) -> String {
    match column {
        KanbanColumn::InProgress => format!("Delivery '{}' was started", title),
        KanbanColumn::InReview => format!("Delivery '{}' was sent for review", title),
        KanbanColumn::Approved => format!("Delivery '{}' was approved", title),
        KanbanColumn::Published => format!("Delivery '{}' was published", title),
        KanbanColumn::Rejected => format!("Delivery '{}' was rejected", title),
        KanbanColumn::Pending => format!(
            "Delivery '{}' was moved to {}",
            title,
            column.status().label()
        ),
    }
}

#[derive(Clone)]
pub struct DeliveryWorkflow {
    repo: Arc<Repository>,
    events: EventBus,
}

impl DeliveryWorkflow {
    pub fn new(repo: Arc<Repository>, events: EventBus) -> Self {
        Self { repo, events }
    }

    /// Move a delivery to a board column on behalf of `actor_id`.
    ///
    /// Returns `None` when the delivery does not exist.
    pub async fn move_delivery(
        &self,
        delivery_id: &str,
        column: KanbanColumn,
        actor_id: &str,
    ) -> Result<Option<MoveOutcome>, AppError> {
        if actor_id.trim().is_empty() {
            return Err(AppError::Validation("Actor is required".to_string()));
        }

        let mut tx = self.repo.begin().await?;
        let Some(existing) = db::fetch_delivery(&mut tx, delivery_id).await? else {
            return Ok(None);
        };

        let from = existing.status;
        let to = column.status();
        if from == to {
            return Ok(Some(MoveOutcome::Unchanged(existing)));
        }
        if !transition_allowed(from, to) {
            tracing::info!(
                delivery_id = %delivery_id,
                from = from.as_str(),
                to = to.as_str(),
                "Delivery move refused"
            );
            return Ok(Some(MoveOutcome::Refused { from, to }));
        }

        let now = Utc::now();
        let mut delivery = existing;
        delivery.status = to;
        delivery.progress = to.canonical_progress();
        delivery.updated_at = now;
        if to == DeliveryStatus::Published && delivery.published_at.is_none() {
            delivery.published_at = Some(now);
        }

        let comment = DeliveryComment {
            id: uuid::Uuid::new_v4().to_string(),
            delivery_id: delivery.id.clone(),
            user_id: actor_id.to_string(),
            text: transition_comment(from, to),
            timecode: None,
            timestamp: now,
            is_system: true,
        };

        let mut recipients: Vec<String> = delivery.created_by.iter().cloned().collect();
        if let Some(responsible_id) = &delivery.responsible_id {
            if let Some(user_id) = db::fetch_member(&mut tx, responsible_id)
                .await?
                .and_then(|member| member.user_id)
            {
                recipients.push(user_id);
            }
        }
        recipients.retain(|user| user != actor_id);
        recipients.dedup();

        if !db::update_delivery(&mut tx, &delivery).await? {
            return Ok(None);
        }
        db::insert_comment(&mut tx, &comment).await?;
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            delivery_id = %delivery.id,
            from = from.as_str(),
            to = to.as_str(),
            "Delivery moved"
        );

        self.events
            .publish(DomainEvent::DeliveryMoved {
                delivery_id: delivery.id.clone(),
                column,
            })
            .await;

        let notification = if recipients.is_empty() {
            None
        } else {
            let level = if to == DeliveryStatus::Rejected {
                NotificationLevel::Warning
            } else {
                NotificationLevel::Info
            };
            let notification = Notification::new(
                "Delivery update",
                move_message(&delivery.title, column),
                level,
                NotificationKind::Delivery,
            )
            .recipients(recipients)
            .data(serde_json::json!({
                "deliveryId": delivery.id,
                "oldStatus": from,
                "newStatus": to,
                "actorId": actor_id,
            }));
            self.events.publish(notification.clone().into()).await;
            Some(notification)
        };

        Ok(Some(MoveOutcome::Moved {
            delivery,
            comment,
            notification,
        }))
    }

    pub async fn create(&self, request: CreateDeliveryRequest) -> Result<Delivery, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        validate_priority(request.priority)?;

        let mut tx = self.repo.begin().await?;
        if let Some(responsible_id) = &request.responsible_id {
            ensure_member(&mut tx, responsible_id).await?;
        }

        let now = Utc::now();
        let delivery = Delivery {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title.trim().to_string(),
            description: request.description,
            deadline: request.deadline,
            format_specs: request.format_specs,
            responsible_id: request.responsible_id,
            activity_id: request.activity_id,
            event_id: request.event_id,
            priority: request.priority,
            status: DeliveryStatus::Pending,
            progress: DeliveryStatus::Pending.canonical_progress(),
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
            published_at: None,
        };

        db::insert_delivery(&mut tx, &delivery).await?;
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(delivery_id = %delivery.id, title = %delivery.title, "Delivery created");
        self.events
            .publish(DomainEvent::DeliveryCreated {
                delivery_id: delivery.id.clone(),
            })
            .await;
        Ok(delivery)
    }

    /// Edit descriptive fields. Returns `None` when the delivery does not exist.
    pub async fn update(
        &self,
        id: &str,
        changes: UpdateDeliveryRequest,
    ) -> Result<Option<Delivery>, AppError> {
        let mut tx = self.repo.begin().await?;
        let Some(mut delivery) = db::fetch_delivery(&mut tx, id).await? else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Title is required".to_string()));
            }
            delivery.title = title.trim().to_string();
        }
        if let Some(priority) = changes.priority {
            validate_priority(priority)?;
            delivery.priority = priority;
        }
        if let Some(responsible_id) = changes.responsible_id {
            ensure_member(&mut tx, &responsible_id).await?;
            delivery.responsible_id = Some(responsible_id);
        }
        if let Some(deadline) = changes.deadline {
            delivery.deadline = deadline;
        }
        if changes.description.is_some() {
            delivery.description = changes.description;
        }
        if changes.format_specs.is_some() {
            delivery.format_specs = changes.format_specs;
        }
        if changes.activity_id.is_some() {
            delivery.activity_id = changes.activity_id;
        }
        if changes.event_id.is_some() {
            delivery.event_id = changes.event_id;
        }
        delivery.updated_at = Utc::now();

        if !db::update_delivery(&mut tx, &delivery).await? {
            return Ok(None);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(delivery_id = %delivery.id, "Delivery updated");
        Ok(Some(delivery))
    }

    /// Delete a delivery and its comments.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.repo.begin().await?;
        if !db::delete_delivery(&mut tx, id).await? {
            return Ok(false);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(delivery_id = %id, "Delivery deleted");
        Ok(true)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Delivery>, AppError> {
        self.repo.get_delivery(id).await
    }

    pub async fn list(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, AppError> {
        self.repo.list_deliveries(filter).await
    }

    /// Add a user comment. Returns `None` when the delivery does not exist.
    pub async fn add_comment(
        &self,
        delivery_id: &str,
        request: CreateCommentRequest,
    ) -> Result<Option<DeliveryComment>, AppError> {
        if request.user_id.trim().is_empty() {
            return Err(AppError::Validation("User is required".to_string()));
        }
        if request.text.trim().is_empty() {
            return Err(AppError::Validation("Comment text is required".to_string()));
        }

        let mut tx = self.repo.begin().await?;
        if db::fetch_delivery(&mut tx, delivery_id).await?.is_none() {
            return Ok(None);
        }

        let comment = DeliveryComment {
            id: uuid::Uuid::new_v4().to_string(),
            delivery_id: delivery_id.to_string(),
            user_id: request.user_id,
            text: request.text.trim().to_string(),
            timecode: request.timecode,
            timestamp: Utc::now(),
            is_system: false,
        };
        db::insert_comment(&mut tx, &comment).await?;
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(Some(comment))
    }

    /// Comments of a delivery. Returns `None` when the delivery does not exist.
    pub async fn comments(
        &self,
        delivery_id: &str,
        newest_first: bool,
    ) -> Result<Option<Vec<DeliveryComment>>, AppError> {
        if self.repo.get_delivery(delivery_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.repo.list_comments(delivery_id, newest_first).await?))
    }

    /// Open deliveries past their deadline.
    pub async fn late(&self, now: DateTime<Utc>) -> Result<Vec<Delivery>, AppError> {
        self.repo.list_late_deliveries(now).await
    }

    /// Open deliveries due within `days_ahead` days.
    pub async fn upcoming(
        &self,
        now: DateTime<Utc>,
        days_ahead: i64,
    ) -> Result<Vec<Delivery>, AppError> {
        if days_ahead < 0 {
            return Err(AppError::Validation(
                "Days ahead must not be negative".to_string(),
            ));
        }
        self.repo
            .list_deliveries_due_between(now, now + Duration::days(days_ahead))
            .await
    }

    /// Deliveries waiting in the review column.
    pub async fn pending_approvals(&self) -> Result<Vec<Delivery>, AppError> {
        let filter = DeliveryFilter {
            status: Some(DeliveryStatus::Review),
            ..Default::default()
        };
        self.repo.list_deliveries(&filter).await
    }

    pub async fn stats(
        &self,
        event_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DeliveryStats, AppError> {
        let filter = DeliveryFilter {
            event_id: event_id.map(str::to_string),
            ..Default::default()
        };
        let deliveries = self.repo.list_deliveries(&filter).await?;
        Ok(summarize_deliveries(&deliveries, now))
    }
}

/// Board figures for a set of deliveries. Rates are percentages with one decimal.
pub fn summarize_deliveries(deliveries: &[Delivery], now: DateTime<Utc>) -> DeliveryStats {
    let mut by_status: BTreeMap<String, i64> = DeliveryStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for delivery in deliveries {
        *by_status
            .entry(delivery.status.as_str().to_string())
            .or_default() += 1;
    }

    let soon = now + Duration::days(UPCOMING_WINDOW_DAYS);
    let late = deliveries.iter().filter(|d| d.is_overdue(now)).count() as i64;
    let upcoming_deadline = deliveries
        .iter()
        .filter(|d| d.status.is_open() && d.deadline > now && d.deadline <= soon)
        .count() as i64;

    let total = deliveries.len() as i64;
    let done = deliveries.iter().filter(|d| d.status.is_done()).count() as i64;
    let rejected = by_status
        .get(DeliveryStatus::Rejected.as_str())
        .copied()
        .unwrap_or(0);

    DeliveryStats {
        total,
        by_status,
        late,
        upcoming_deadline,
        completion_rate: percentage(done, total),
        problem_rate: percentage(rejected, total),
    }
}

fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

fn validate_priority(priority: i64) -> Result<(), AppError> {
    if !is_valid_priority(priority) {
        return Err(AppError::Validation(format!(
            "Priority must be between 1 and 4, got {}",
            priority
        )));
    }
    Ok(())
}

async fn ensure_member(conn: &mut sqlx::SqliteConnection, member_id: &str) -> Result<(), AppError> {
    if db::fetch_member(conn, member_id).await?.is_none() {
        return Err(AppError::Validation(format!(
            "Responsible member {} does not exist",
            member_id
        )));
    }
    Ok(())
}
