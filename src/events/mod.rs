//! Domain events and notifications.
//!
//! Workflows publish a typed [`DomainEvent`] after each committed state change. Observers
//! (the UI bridge, the log writer, tests) subscribe to the broadcast channel. Notification
//! events are also kept in a bounded [`NotificationCenter`] so clients can poll them.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::models::{ActivationStatus, KanbanColumn, TeamAssignment};

/// Events buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Area of the application a notification belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    System,
    Delivery,
    Activation,
    Assignment,
}

/// A user-facing message produced by a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
    pub kind: NotificationKind,
    /// Users the caller should fan the notification out to
    pub recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        level: NotificationLevel,
        kind: NotificationKind,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            level,
            kind,
            recipients: Vec::new(),
            data: None,
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Attach context the UI can use to open the related record.
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// State changes observable by the UI layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    AssignmentConflict {
        assignment: TeamAssignment,
        conflicts: Vec<TeamAssignment>,
    },
    AssignmentSaved {
        assignment: TeamAssignment,
    },
    AssignmentDeleted {
        assignment_id: String,
        member_id: String,
    },
    DeliveryCreated {
        delivery_id: String,
    },
    DeliveryMoved {
        delivery_id: String,
        column: KanbanColumn,
    },
    Notification {
        notification: Notification,
    },
    ActivationStatusChanged {
        activation_id: String,
        old_status: ActivationStatus,
        new_status: ActivationStatus,
    },
    EvidenceAdded {
        activation_id: String,
        evidence_id: String,
    },
    EvidenceRemoved {
        activation_id: String,
        evidence_id: String,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::AssignmentConflict { .. } => "assignment_conflict",
            DomainEvent::AssignmentSaved { .. } => "assignment_saved",
            DomainEvent::AssignmentDeleted { .. } => "assignment_deleted",
            DomainEvent::DeliveryCreated { .. } => "delivery_created",
            DomainEvent::DeliveryMoved { .. } => "delivery_moved",
            DomainEvent::Notification { .. } => "notification",
            DomainEvent::ActivationStatusChanged { .. } => "activation_status_changed",
            DomainEvent::EvidenceAdded { .. } => "evidence_added",
            DomainEvent::EvidenceRemoved { .. } => "evidence_removed",
        }
    }
}

impl From<Notification> for DomainEvent {
    fn from(notification: Notification) -> Self {
        DomainEvent::Notification { notification }
    }
}

/// Bounded, most-recent-last store of notifications.
pub struct NotificationCenter {
    items: RwLock<VecDeque<Notification>>,
    max_size: usize,
}

impl NotificationCenter {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: RwLock::new(VecDeque::new()),
            max_size: max_size.max(1),
        }
    }

    async fn record(&self, notification: Notification) {
        let mut items = self.items.write().await;
        items.push_back(notification);
        while items.len() > self.max_size {
            items.pop_front();
        }
    }

    pub async fn list(&self) -> Vec<Notification> {
        self.items.read().await.iter().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<Notification> {
        self.items.read().await.iter().find(|n| n.id == id).cloned()
    }

    /// Returns false when the notification is unknown or already read.
    pub async fn mark_read(&self, id: &str) -> bool {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|n| n.id == id && !n.read) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// Returns the number of notifications that changed.
    pub async fn mark_all_read(&self) -> usize {
        let mut items = self.items.write().await;
        let mut changed = 0;
        for notification in items.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    pub async fn remove(&self, id: &str) -> bool {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|n| n.id != id);
        items.len() != before
    }

    pub async fn clear(&self) {
        self.items.write().await.clear();
    }

    pub async fn unread_count(&self) -> usize {
        self.items.read().await.iter().filter(|n| !n.read).count()
    }
}

/// Fan-out point for domain events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    notifications: Arc<NotificationCenter>,
}

impl EventBus {
    pub fn new(notification_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            notifications: Arc::new(NotificationCenter::new(notification_capacity)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub async fn publish(&self, event: DomainEvent) {
        if let DomainEvent::Notification { notification } = &event {
            self.notifications.record(notification.clone()).await;
        }
        // No subscribers is fine: the UI may not be attached.
        let _ = self.sender.send(event);
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.publish(event).await;
        }
    }
}

/// Log every published event until the bus is dropped.
pub fn spawn_event_logger(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(DomainEvent::Notification { notification }) => match notification.level {
                    NotificationLevel::Info => {
                        tracing::info!(title = %notification.title, "Notification: {}", notification.message)
                    }
                    NotificationLevel::Warning => {
                        tracing::warn!(title = %notification.title, "Notification: {}", notification.message)
                    }
                    NotificationLevel::Error => {
                        tracing::error!(title = %notification.title, "Notification: {}", notification.message)
                    }
                },
                Ok(event) => tracing::debug!(event = event.name(), "Domain event: {:?}", event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event logger lagged, skipped {} events", skipped)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str) -> Notification {
        Notification::new(title, "message", NotificationLevel::Info, NotificationKind::System)
    }

    #[tokio::test]
    async fn test_center_evicts_oldest() {
        let bus = EventBus::new(2);
        for title in ["first", "second", "third"] {
            bus.publish(note(title).into()).await;
        }

        let titles: Vec<String> = bus
            .notifications()
            .list()
            .await
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_count() {
        let bus = EventBus::new(10);
        let first = note("first");
        let first_id = first.id.clone();
        bus.publish(first.into()).await;
        bus.publish(note("second").into()).await;

        assert_eq!(bus.notifications().unread_count().await, 2);
        assert!(bus.notifications().mark_read(&first_id).await);
        assert!(!bus.notifications().mark_read(&first_id).await);
        assert_eq!(bus.notifications().unread_count().await, 1);
        assert_eq!(bus.notifications().mark_all_read().await, 1);
        assert_eq!(bus.notifications().unread_count().await, 0);
        assert!(bus.notifications().remove(&first_id).await);
        assert!(bus.notifications().get(&first_id).await.is_none());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.publish(DomainEvent::DeliveryCreated {
            delivery_id: "d1".to_string(),
        })
        .await;
        bus.publish(DomainEvent::DeliveryMoved {
            delivery_id: "d1".to_string(),
            column: KanbanColumn::InReview,
        })
        .await;

        assert_eq!(receiver.recv().await.unwrap().name(), "delivery_created");
        let moved = receiver.recv().await.unwrap();
        let json = serde_json::to_value(&moved).unwrap();
        assert_eq!(json["type"], "delivery_moved");
        assert_eq!(json["deliveryId"], "d1");
        assert_eq!(json["column"], "in_review");
    }
}
