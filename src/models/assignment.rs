//! Team assignment (crew booking) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Booking lifecycle. Finalized bookings are historical and never block new ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Active,
    Finalized,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Finalized => "finalized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AssignmentStatus::Active),
            "finalized" => Some(AssignmentStatus::Finalized),
            _ => None,
        }
    }
}

/// A time-bounded allocation of a team member to an activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamAssignment {
    pub id: String,
    pub member_id: String,
    pub activity_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamAssignment {
    /// Whether this booking still takes part in conflict checks.
    pub fn is_open(&self) -> bool {
        self.status != AssignmentStatus::Finalized
    }
}

/// Request body for booking a member onto an activity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub member_id: String,
    pub activity_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub role_details: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Request body for changing a booking. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub role_details: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Dry-run conflict query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheckRequest {
    pub member_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Booking to ignore, used when re-checking an existing record
    #[serde(default)]
    pub exclude_id: Option<String>,
}

/// Query parameters for listing bookings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFilter {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    /// Keep bookings ending at or after this instant
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Keep bookings starting at or before this instant
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
}

/// Two open bookings of the same member that overlap.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPair {
    pub member_id: String,
    pub first: TeamAssignment,
    pub second: TeamAssignment,
}

/// Bookings of one member inside a schedule window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSchedule {
    pub member_id: String,
    pub assignments: Vec<TeamAssignment>,
}
