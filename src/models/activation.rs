//! Sponsor activation and evidence models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activation lifecycle: pending → in_progress → (filmed | failed) → approved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    #[default]
    Pending,
    InProgress,
    #[serde(alias = "completed")]
    Filmed,
    Failed,
    Approved,
    Canceled,
}

impl ActivationStatus {
    pub const ALL: [ActivationStatus; 6] = [
        ActivationStatus::Pending,
        ActivationStatus::InProgress,
        ActivationStatus::Filmed,
        ActivationStatus::Failed,
        ActivationStatus::Approved,
        ActivationStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationStatus::Pending => "pending",
            ActivationStatus::InProgress => "in_progress",
            ActivationStatus::Filmed => "filmed",
            ActivationStatus::Failed => "failed",
            ActivationStatus::Approved => "approved",
            ActivationStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(ActivationStatus::Filmed),
            _ => ActivationStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == s),
        }
    }

    /// Counted as delivered to the sponsor in statistics.
    pub fn is_completed(&self) -> bool {
        matches!(self, ActivationStatus::Filmed | ActivationStatus::Approved)
    }
}

/// A sponsor-funded promotional moment tied to an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub id: String,
    pub sponsor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: ActivationStatus,
    pub scheduled_date: DateTime<Utc>,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Evidence classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Photo,
    Video,
    Document,
    Other,
}

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv", "flv"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx"];

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Photo => "photo",
            EvidenceKind::Video => "video",
            EvidenceKind::Document => "document",
            EvidenceKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(EvidenceKind::Photo),
            "video" => Some(EvidenceKind::Video),
            "document" => Some(EvidenceKind::Document),
            "other" => Some(EvidenceKind::Other),
            _ => None,
        }
    }

    /// Classify a file reference by its extension (case-insensitive).
    pub fn detect(file_reference: &str) -> Self {
        let extension = std::path::Path::new(file_reference)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some(ext) if PHOTO_EXTENSIONS.contains(&ext) => EvidenceKind::Photo,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => EvidenceKind::Video,
            Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext) => EvidenceKind::Document,
            _ => EvidenceKind::Other,
        }
    }
}

/// A file proving an activation happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationEvidence {
    pub id: String,
    pub activation_id: String,
    pub file_reference: String,
    pub kind: EvidenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

fn default_priority() -> i64 {
    2
}

/// Request body for creating an activation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivationRequest {
    pub sponsor_id: String,
    pub name: String,
    pub scheduled_date: DateTime<Utc>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub responsible_id: Option<String>,
}

/// Request body for editing activation fields. Status has its own operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivationRequest {
    #[serde(default)]
    pub sponsor_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub responsible_id: Option<String>,
}

/// Request body for an explicit status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivationStatusRequest {
    pub status: ActivationStatus,
    pub actor_id: String,
}

/// Request body for attaching evidence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEvidenceRequest {
    pub file_reference: String,
    /// Detected from the file extension when absent
    #[serde(default)]
    pub kind: Option<EvidenceKind>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

/// Request body for approving or rejecting evidence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceApprovalRequest {
    pub approved: bool,
    pub actor_id: String,
}

/// Query parameters for listing activations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationFilter {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub sponsor_id: Option<String>,
    #[serde(default)]
    pub responsible_id: Option<String>,
    #[serde(default)]
    pub status: Option<ActivationStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    /// Matched against name, description and location
    #[serde(default)]
    pub search_text: Option<String>,
}

/// Result of re-evaluating an activation after its evidence changed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceCheck {
    pub activation_id: String,
    pub evidence_count: i64,
    pub status: ActivationStatus,
    /// Set when the check moved the activation from pending to in progress
    pub auto_started: bool,
    /// Set when enough evidence exists to suggest completing the activation
    pub completion_suggested: bool,
}

/// Evidence added together with the resulting activation check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceReceipt {
    pub evidence: ActivationEvidence,
    pub check: EvidenceCheck,
}

/// Per-sponsor activation count.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SponsorActivationCount {
    pub sponsor_id: String,
    pub count: i64,
}

/// Aggregate activation figures.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStats {
    pub total_activations: i64,
    pub status_counts: std::collections::BTreeMap<String, i64>,
    pub sponsors: Vec<SponsorActivationCount>,
    pub total_evidence: i64,
    pub avg_evidence_per_activation: f64,
    /// Share of filmed or approved activations, between 0 and 1
    pub completion_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_evidence_kind() {
        assert_eq!(EvidenceKind::detect("uploads/stand.JPG"), EvidenceKind::Photo);
        assert_eq!(EvidenceKind::detect("banner.png"), EvidenceKind::Photo);
        assert_eq!(EvidenceKind::detect("/media/clip.mov"), EvidenceKind::Video);
        assert_eq!(EvidenceKind::detect("report.pdf"), EvidenceKind::Document);
        assert_eq!(EvidenceKind::detect("deck.pptx"), EvidenceKind::Document);
        assert_eq!(EvidenceKind::detect("audio.wav"), EvidenceKind::Other);
        assert_eq!(EvidenceKind::detect("no-extension"), EvidenceKind::Other);
    }

    #[test]
    fn test_completed_is_alias_for_filmed() {
        let status: ActivationStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, ActivationStatus::Filmed);
        assert_eq!(ActivationStatus::parse("completed"), Some(ActivationStatus::Filmed));
        assert_eq!(serde_json::to_value(status).unwrap(), "filmed");
    }
}
