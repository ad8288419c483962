//! Sponsor activation workflow.
//!
//! Besides explicit status changes, an activation reacts to its evidence: the first piece of
//! evidence starts a pending activation, and enough evidence suggests (never forces) completion.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Notification, NotificationKind, NotificationLevel};
use crate::models::{
    is_valid_priority, Activation, ActivationFilter, ActivationStats, ActivationStatus,
    CreateActivationRequest, EvidenceCheck, SponsorActivationCount, UpdateActivationRequest,
};

#[derive(Clone)]
pub struct ActivationWorkflow {
    repo: Arc<Repository>,
    events: EventBus,
    suggest_threshold: i64,
}

impl ActivationWorkflow {
    pub fn new(repo: Arc<Repository>, events: EventBus, suggest_threshold: i64) -> Self {
        Self {
            repo,
            events,
            suggest_threshold: suggest_threshold.max(1),
        }
    }

    /// Set the status explicitly. Returns `None` when the activation does not exist.
    pub async fn update_status(
        &self,
        activation_id: &str,
        new_status: ActivationStatus,
        actor_id: &str,
    ) -> Result<Option<Activation>, AppError> {
        if actor_id.trim().is_empty() {
            return Err(AppError::Validation("Actor is required".to_string()));
        }

        let mut tx = self.repo.begin().await?;
        let Some(mut activation) = db::fetch_activation(&mut tx, activation_id).await? else {
            return Ok(None);
        };

        let old_status = activation.status;
        if old_status == new_status {
            return Ok(Some(activation));
        }

        let now = Utc::now();
        activation.status = new_status;
        activation.updated_at = now;
        match new_status {
            ActivationStatus::Approved => activation.approved_by = Some(actor_id.to_string()),
            ActivationStatus::Filmed => activation.completed_at = Some(now),
            _ => {}
        }

        if !db::update_activation(&mut tx, &activation).await? {
            return Ok(None);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            activation_id = %activation.id,
            from = old_status.as_str(),
            to = new_status.as_str(),
            "Activation status changed"
        );
        self.events
            .publish(DomainEvent::ActivationStatusChanged {
                activation_id: activation.id.clone(),
                old_status,
                new_status,
            })
            .await;
        Ok(Some(activation))
    }

    /// Re-evaluate an activation against its evidence in a transaction of its own.
    pub async fn on_evidence_changed(
        &self,
        activation_id: &str,
    ) -> Result<Option<EvidenceCheck>, AppError> {
        let mut tx = self.repo.begin().await?;
        let Some((check, events)) = self.evaluate_evidence(&mut tx, activation_id).await? else {
            return Ok(None);
        };
        if check.auto_started {
            db::bump_revision(&mut tx).await?;
        }
        tx.commit().await?;

        self.events.publish_all(events).await;
        Ok(Some(check))
    }

    /// Apply the evidence rules inside the caller's transaction.
    ///
    /// Returns the events to publish once the caller has committed. Never demotes a status.
    pub(crate) async fn evaluate_evidence(
        &self,
        conn: &mut SqliteConnection,
        activation_id: &str,
    ) -> Result<Option<(EvidenceCheck, Vec<DomainEvent>)>, AppError> {
        let Some(mut activation) = db::fetch_activation(&mut *conn, activation_id).await? else {
            return Ok(None);
        };
        let evidence_count = db::count_evidence(&mut *conn, activation_id).await?;
        let mut events = Vec::new();
        let mut auto_started = false;
        let mut completion_suggested = false;

        if activation.status == ActivationStatus::Pending && evidence_count > 0 {
            activation.status = ActivationStatus::InProgress;
            activation.updated_at = Utc::now();
            if !db::update_activation(&mut *conn, &activation).await? {
                return Ok(None);
            }
            auto_started = true;
            tracing::info!(activation_id = %activation.id, "Activation started by first evidence");
            events.push(DomainEvent::ActivationStatusChanged {
                activation_id: activation.id.clone(),
                old_status: ActivationStatus::Pending,
                new_status: ActivationStatus::InProgress,
            });
        }

        if activation.status == ActivationStatus::InProgress
            && evidence_count >= self.suggest_threshold
        {
            completion_suggested = true;
            let mut recipients = Vec::new();
            if let Some(responsible_id) = &activation.responsible_id {
                if let Some(user_id) = db::fetch_member(&mut *conn, responsible_id)
                    .await?
                    .and_then(|member| member.user_id)
                {
                    recipients.push(user_id);
                }
            }
            let notification = Notification::new(
                "Activation ready for completion",
                format!(
                    "Activation '{}' has {} pieces of evidence. Consider marking it as filmed.",
                    activation.name, evidence_count
                ),
                NotificationLevel::Warning,
                NotificationKind::Activation,
            )
            .recipients(recipients)
            .data(serde_json::json!({
                "activationId": activation.id,
                "evidenceCount": evidence_count,
            }));
            events.push(notification.into());
        }

        Ok(Some((
            EvidenceCheck {
                activation_id: activation.id,
                evidence_count,
                status: activation.status,
                auto_started,
                completion_suggested,
            },
            events,
        )))
    }

    pub async fn create(&self, request: CreateActivationRequest) -> Result<Activation, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if request.sponsor_id.trim().is_empty() {
            return Err(AppError::Validation("Sponsor is required".to_string()));
        }
        validate_priority(request.priority)?;

        let now = Utc::now();
        let activation = Activation {
            id: uuid::Uuid::new_v4().to_string(),
            sponsor_id: request.sponsor_id,
            event_id: request.event_id,
            activity_id: request.activity_id,
            name: request.name.trim().to_string(),
            description: request.description,
            location: request.location,
            status: ActivationStatus::Pending,
            scheduled_date: request.scheduled_date,
            priority: request.priority,
            responsible_id: request.responsible_id,
            approved_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.repo.begin().await?;
        db::insert_activation(&mut tx, &activation).await?;
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(activation_id = %activation.id, name = %activation.name, "Activation created");
        Ok(activation)
    }

    /// Edit descriptive fields. Returns `None` when the activation does not exist.
    pub async fn update(
        &self,
        id: &str,
        changes: UpdateActivationRequest,
    ) -> Result<Option<Activation>, AppError> {
        let mut tx = self.repo.begin().await?;
        let Some(mut activation) = db::fetch_activation(&mut tx, id).await? else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Name is required".to_string()));
            }
            activation.name = name.trim().to_string();
        }
        if let Some(sponsor_id) = changes.sponsor_id {
            if sponsor_id.trim().is_empty() {
                return Err(AppError::Validation("Sponsor is required".to_string()));
            }
            activation.sponsor_id = sponsor_id;
        }
        if let Some(priority) = changes.priority {
            validate_priority(priority)?;
            activation.priority = priority;
        }
        if let Some(scheduled_date) = changes.scheduled_date {
            activation.scheduled_date = scheduled_date;
        }
        if changes.event_id.is_some() {
            activation.event_id = changes.event_id;
        }
        if changes.activity_id.is_some() {
            activation.activity_id = changes.activity_id;
        }
        if changes.description.is_some() {
            activation.description = changes.description;
        }
        if changes.location.is_some() {
            activation.location = changes.location;
        }
        if changes.responsible_id.is_some() {
            activation.responsible_id = changes.responsible_id;
        }
        activation.updated_at = Utc::now();

        if !db::update_activation(&mut tx, &activation).await? {
            return Ok(None);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(activation_id = %activation.id, "Activation updated");
        Ok(Some(activation))
    }

    /// Delete an activation together with its evidence.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.repo.begin().await?;
        if !db::delete_activation(&mut tx, id).await? {
            return Ok(false);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(activation_id = %id, "Activation deleted");
        Ok(true)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Activation>, AppError> {
        self.repo.get_activation(id).await
    }

    pub async fn list(&self, filter: &ActivationFilter) -> Result<Vec<Activation>, AppError> {
        self.repo.list_activations(filter).await
    }

    pub async fn evidence_counts(
        &self,
        activation_ids: &[String],
    ) -> Result<BTreeMap<String, i64>, AppError> {
        self.repo.evidence_counts(activation_ids).await
    }

    pub async fn stats(&self, event_id: Option<&str>) -> Result<ActivationStats, AppError> {
        let filter = ActivationFilter {
            event_id: event_id.map(str::to_string),
            ..Default::default()
        };
        let activations = self.repo.list_activations(&filter).await?;
        let total_evidence = self.repo.count_all_evidence(event_id).await?;
        Ok(summarize_activations(&activations, total_evidence))
    }
}

/// Aggregate figures for a set of activations.
pub fn summarize_activations(activations: &[Activation], total_evidence: i64) -> ActivationStats {
    let mut status_counts: BTreeMap<String, i64> = ActivationStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    let mut per_sponsor: BTreeMap<&str, i64> = BTreeMap::new();
    for activation in activations {
        *status_counts
            .entry(activation.status.as_str().to_string())
            .or_default() += 1;
        *per_sponsor.entry(activation.sponsor_id.as_str()).or_default() += 1;
    }

    let mut sponsors: Vec<SponsorActivationCount> = per_sponsor
        .into_iter()
        .map(|(sponsor_id, count)| SponsorActivationCount {
            sponsor_id: sponsor_id.to_string(),
            count,
        })
        .collect();
    sponsors.sort_by(|a, b| b.count.cmp(&a.count).then(a.sponsor_id.cmp(&b.sponsor_id)));

    let total = activations.len() as i64;
    let completed = activations
        .iter()
        .filter(|a| a.status.is_completed())
        .count() as i64;
    let ratio = |part: i64| {
        if total == 0 {
            0.0
        } else {
            part as f64 / total as f64
        }
    };

    ActivationStats {
        total_activations: total,
        status_counts,
        sponsors,
        total_evidence,
        avg_evidence_per_activation: ratio(total_evidence),
        completion_rate: ratio(completed),
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_support::{activation_request, TestDesk};

    #[tokio::test]
    async fn test_approval_records_approver_and_emits_once() {
        let desk = TestDesk::new().await;
        let workflow = desk.activations(3);
        let activation = workflow.create(activation_request("Logo wall")).await.unwrap();
        let mut events = desk.events.subscribe();

        let approved = workflow
            .update_status(&activation.id, ActivationStatus::Approved, "user-director")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved.approved_by.as_deref(), Some("user-director"));

        // Same status again is a no-op
        let again = workflow
            .update_status(&activation.id, ActivationStatus::Approved, "user-other")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.approved_by.as_deref(), Some("user-director"));

        match events.recv().await.unwrap() {
            DomainEvent::ActivationStatusChanged {
                old_status,
                new_status,
                ..
            } => {
                assert_eq!(old_status, ActivationStatus::Pending);
                assert_eq!(new_status, ActivationStatus::Approved);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_filmed_stamps_completion_time() {
        let desk = TestDesk::new().await;
        let workflow = desk.activations(3);
        let activation = workflow.create(activation_request("Giveaway")).await.unwrap();

        let filmed = workflow
            .update_status(&activation.id, ActivationStatus::Filmed, "user-camera")
            .await
            .unwrap()
            .unwrap();
        assert!(filmed.completed_at.is_some());
        assert!(workflow
            .update_status("missing", ActivationStatus::Filmed, "user-camera")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_evidence_check_without_evidence_changes_nothing() {
        let desk = TestDesk::new().await;
        let workflow = desk.activations(3);
        let activation = workflow.create(activation_request("Sampling")).await.unwrap();

        let check = workflow
            .on_evidence_changed(&activation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(check.evidence_count, 0);
        assert_eq!(check.status, ActivationStatus::Pending);
        assert!(!check.auto_started);
        assert!(!check.completion_suggested);
    }

    #[test]
    fn test_stats_counts_sponsors_and_completion() {
        let now = Utc::now();
        let make = |sponsor: &str, status: ActivationStatus| Activation {
            id: uuid::Uuid::new_v4().to_string(),
            sponsor_id: sponsor.to_string(),
            event_id: None,
            activity_id: None,
            name: "a".to_string(),
            description: None,
            location: None,
            status,
            scheduled_date: now,
            priority: 2,
            responsible_id: None,
            approved_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let activations = vec![
            make("brewery", ActivationStatus::Filmed),
            make("brewery", ActivationStatus::Pending),
            make("bank", ActivationStatus::Approved),
            make("bank", ActivationStatus::Canceled),
        ];

        let stats = summarize_activations(&activations, 6);
        assert_eq!(stats.total_activations, 4);
        assert_eq!(stats.status_counts["filmed"], 1);
        assert_eq!(stats.status_counts["failed"], 0);
        assert_eq!(stats.sponsors[0].sponsor_id, "bank");
        assert_eq!(stats.sponsors[0].count, 2);
        assert_eq!(stats.avg_evidence_per_activation, 1.5);
        assert_eq!(stats.completion_rate, 0.5);

        let empty = summarize_activations(&[], 0);
        assert_eq!(empty.completion_rate, 0.0);
    }
}
