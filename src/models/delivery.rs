//! Content delivery model and its Kanban board vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored delivery status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    InProgress,
    Review,
    Approved,
    Published,
    Rejected,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 6] = [
        DeliveryStatus::Pending,
        DeliveryStatus::InProgress,
        DeliveryStatus::Review,
        DeliveryStatus::Approved,
        DeliveryStatus::Published,
        DeliveryStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Review => "review",
            DeliveryStatus::Approved => "approved",
            DeliveryStatus::Published => "published",
            DeliveryStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        DeliveryStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Human-readable label used in system comments and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::InProgress => "In Progress",
            DeliveryStatus::Review => "In Review",
            DeliveryStatus::Approved => "Approved",
            DeliveryStatus::Published => "Published",
            DeliveryStatus::Rejected => "Rejected",
        }
    }

    /// Progress value every delivery in this status carries.
    pub fn canonical_progress(&self) -> f64 {
        match self {
            DeliveryStatus::Pending => 0.0,
            DeliveryStatus::InProgress => 0.3,
            DeliveryStatus::Review => 0.7,
            DeliveryStatus::Approved => 0.9,
            DeliveryStatus::Published => 1.0,
            DeliveryStatus::Rejected => 0.0,
        }
    }

    /// Still being worked on; these count towards late and upcoming lists.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Pending | DeliveryStatus::InProgress | DeliveryStatus::Review
        )
    }

    pub fn is_done(&self) -> bool {
        matches!(self, DeliveryStatus::Approved | DeliveryStatus::Published)
    }
}

/// Column of the six-column delivery board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KanbanColumn {
    Pending,
    InProgress,
    InReview,
    Approved,
    Published,
    Rejected,
}

impl KanbanColumn {
    pub const ALL: [KanbanColumn; 6] = [
        KanbanColumn::Pending,
        KanbanColumn::InProgress,
        KanbanColumn::InReview,
        KanbanColumn::Approved,
        KanbanColumn::Published,
        KanbanColumn::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KanbanColumn::Pending => "pending",
            KanbanColumn::InProgress => "in_progress",
            KanbanColumn::InReview => "in_review",
            KanbanColumn::Approved => "approved",
            KanbanColumn::Published => "published",
            KanbanColumn::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        KanbanColumn::ALL.into_iter().find(|column| column.as_str() == s)
    }

    pub fn status(&self) -> DeliveryStatus {
        match self {
            KanbanColumn::Pending => DeliveryStatus::Pending,
            KanbanColumn::InProgress => DeliveryStatus::InProgress,
            KanbanColumn::InReview => DeliveryStatus::Review,
            KanbanColumn::Approved => DeliveryStatus::Approved,
            KanbanColumn::Published => DeliveryStatus::Published,
            KanbanColumn::Rejected => DeliveryStatus::Rejected,
        }
    }

    pub fn for_status(status: DeliveryStatus) -> Self {
        match status {
            DeliveryStatus::Pending => KanbanColumn::Pending,
            DeliveryStatus::InProgress => KanbanColumn::InProgress,
            DeliveryStatus::Review => KanbanColumn::InReview,
            DeliveryStatus::Approved => KanbanColumn::Approved,
            DeliveryStatus::Published => KanbanColumn::Published,
            DeliveryStatus::Rejected => KanbanColumn::Rejected,
        }
    }
}

/// A content artifact owed to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_specs: Option<String>,
    /// Team member accountable for the delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// 1 low, 2 medium, 3 high, 4 urgent
    pub priority: i64,
    pub status: DeliveryStatus,
    pub progress: f64,
    /// User who created the delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Delivery {
    pub fn column(&self) -> KanbanColumn {
        KanbanColumn::for_status(self.status)
    }

    /// Past its deadline while still open. Same rule as the late list.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.deadline < now
    }

    /// Days until the deadline, negative once it has passed.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> f64 {
        (self.deadline - now).num_seconds() as f64 / 86_400.0
    }

    pub fn view(self, now: DateTime<Utc>) -> DeliveryView {
        DeliveryView {
            column: self.column(),
            is_overdue: self.is_overdue(now),
            days_remaining: self.days_remaining(now),
            delivery: self,
        }
    }
}

/// Delivery as the API returns it: stored fields plus values derived at read time.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryView {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub column: KanbanColumn,
    pub is_overdue: bool,
    pub days_remaining: f64,
}

/// Comment on a delivery. System comments record status transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryComment {
    pub id: String,
    pub delivery_id: String,
    pub user_id: String,
    pub text: String,
    /// Position in the video the comment refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timecode: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_system: bool,
}

fn default_priority() -> i64 {
    3
}

/// Request body for creating a delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub format_specs: Option<String>,
    #[serde(default)]
    pub responsible_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Request body for editing delivery fields. Status only changes through a board move.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeliveryRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format_specs: Option<String>,
    #[serde(default)]
    pub responsible_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Request body for moving a delivery across the board.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDeliveryRequest {
    pub column: String,
    pub actor_id: String,
}

/// Request body for adding a user comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub timecode: Option<String>,
}

/// Query parameters for listing deliveries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFilter {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub responsible_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
    #[serde(default)]
    pub priority: Option<i64>,
    /// Matched against title and description
    #[serde(default)]
    pub search_text: Option<String>,
}

/// Aggregate board figures.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub total: i64,
    pub by_status: std::collections::BTreeMap<String, i64>,
    pub late: i64,
    pub upcoming_deadline: i64,
    /// Percentage of approved or published deliveries, one decimal
    pub completion_rate: f64,
    /// Percentage of rejected deliveries, one decimal
    pub problem_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_map_to_statuses_and_back() {
        for column in KanbanColumn::ALL {
            assert_eq!(KanbanColumn::for_status(column.status()), column);
        }
        assert_eq!(KanbanColumn::parse("in_review"), Some(KanbanColumn::InReview));
        assert_eq!(KanbanColumn::InReview.status(), DeliveryStatus::Review);
        assert_eq!(KanbanColumn::parse("review"), None);
        assert_eq!(KanbanColumn::parse("editing"), None);
    }

    #[test]
    fn test_canonical_progress() {
        assert_eq!(DeliveryStatus::Pending.canonical_progress(), 0.0);
        assert_eq!(DeliveryStatus::InProgress.canonical_progress(), 0.3);
        assert_eq!(DeliveryStatus::Review.canonical_progress(), 0.7);
        assert_eq!(DeliveryStatus::Approved.canonical_progress(), 0.9);
        assert_eq!(DeliveryStatus::Published.canonical_progress(), 1.0);
        assert_eq!(DeliveryStatus::Rejected.canonical_progress(), 0.0);
    }

    fn delivery(status: DeliveryStatus, deadline: DateTime<Utc>) -> Delivery {
        Delivery {
            id: "d1".to_string(),
            title: "Recap".to_string(),
            description: None,
            deadline,
            format_specs: None,
            responsible_id: None,
            activity_id: None,
            event_id: None,
            priority: 3,
            status,
            progress: status.canonical_progress(),
            created_by: None,
            created_at: deadline,
            updated_at: deadline,
            published_at: None,
        }
    }

    #[test]
    fn test_only_open_deliveries_are_overdue() {
        use chrono::TimeZone;
        let deadline = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let after = deadline + chrono::Duration::hours(1);

        for status in DeliveryStatus::ALL {
            let late = delivery(status, deadline);
            assert_eq!(late.is_overdue(after), status.is_open(), "{:?}", status);
            assert!(!late.is_overdue(deadline));
        }
        assert!(!delivery(DeliveryStatus::Rejected, deadline).is_overdue(after));
    }

    #[test]
    fn test_view_adds_derived_fields() {
        use chrono::TimeZone;
        let deadline = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let now = deadline - chrono::Duration::hours(36);

        let view = delivery(DeliveryStatus::Review, deadline).view(now);
        assert_eq!(view.column, KanbanColumn::InReview);
        assert!(!view.is_overdue);
        assert_eq!(view.days_remaining, 1.5);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "d1");
        assert_eq!(json["status"], "review");
        assert_eq!(json["column"], "in_review");
        assert_eq!(json["isOverdue"], false);
        assert_eq!(json["daysRemaining"], 1.5);
    }

    #[test]
    fn test_status_parse_matches_serde_names() {
        for status in DeliveryStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
            assert_eq!(DeliveryStatus::parse(status.as_str()), Some(status));
        }
    }
}
