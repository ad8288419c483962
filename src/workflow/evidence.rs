//! Evidence ledger for sponsor activations.

use std::sync::Arc;

use chrono::Utc;

use super::activations::ActivationWorkflow;
use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::{ActivationEvidence, AddEvidenceRequest, EvidenceKind, EvidenceReceipt};

#[derive(Clone)]
pub struct EvidenceLedger {
    repo: Arc<Repository>,
    events: EventBus,
    activations: ActivationWorkflow,
}

impl EvidenceLedger {
    pub fn new(repo: Arc<Repository>, events: EventBus, activations: ActivationWorkflow) -> Self {
        Self {
            repo,
            events,
            activations,
        }
    }

    /// Attach evidence and re-evaluate the activation in the same transaction.
    ///
    /// Returns `None` when the activation does not exist.
    pub async fn add(
        &self,
        activation_id: &str,
        request: AddEvidenceRequest,
    ) -> Result<Option<EvidenceReceipt>, AppError> {
        let file_reference = request.file_reference.trim().to_string();
        if file_reference.is_empty() {
            return Err(AppError::Validation("File reference is required".to_string()));
        }

        let mut tx = self.repo.begin().await?;
        if db::fetch_activation(&mut tx, activation_id).await?.is_none() {
            return Ok(None);
        }

        let evidence = ActivationEvidence {
            id: uuid::Uuid::new_v4().to_string(),
            activation_id: activation_id.to_string(),
            kind: request
                .kind
                .unwrap_or_else(|| EvidenceKind::detect(&file_reference)),
            file_reference,
            notes: request.notes,
            approved: false,
            approved_by: None,
            approved_at: None,
            uploaded_by: request.uploaded_by,
            uploaded_at: Utc::now(),
        };
        db::insert_evidence(&mut tx, &evidence).await?;

        let Some((check, follow_up)) = self
            .activations
            .evaluate_evidence(&mut tx, activation_id)
            .await?
        else {
            return Ok(None);
        };
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            activation_id = %activation_id,
            evidence_id = %evidence.id,
            kind = evidence.kind.as_str(),
            "Evidence added"
        );
        self.events
            .publish(DomainEvent::EvidenceAdded {
                activation_id: activation_id.to_string(),
                evidence_id: evidence.id.clone(),
            })
            .await;
        self.events.publish_all(follow_up).await;

        Ok(Some(EvidenceReceipt { evidence, check }))
    }

    /// Remove evidence. The activation keeps its status.
    pub async fn remove(&self, evidence_id: &str) -> Result<bool, AppError> {
        let mut tx = self.repo.begin().await?;
        let Some(evidence) = db::fetch_evidence(&mut tx, evidence_id).await? else {
            return Ok(false);
        };
        if !db::delete_evidence(&mut tx, evidence_id).await? {
            return Ok(false);
        }
        let follow_up = self
            .activations
            .evaluate_evidence(&mut tx, &evidence.activation_id)
            .await?
            .map(|(_, events)| events)
            .unwrap_or_default();
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            activation_id = %evidence.activation_id,
            evidence_id = %evidence_id,
            "Evidence removed"
        );
        self.events
            .publish(DomainEvent::EvidenceRemoved {
                activation_id: evidence.activation_id,
                evidence_id: evidence.id,
            })
            .await;
        self.events.publish_all(follow_up).await;
        Ok(true)
    }

    /// Approve or reject a piece of evidence. Returns `None` when it does not exist.
    pub async fn set_approval(
        &self,
        evidence_id: &str,
        approved: bool,
        actor_id: &str,
    ) -> Result<Option<ActivationEvidence>, AppError> {
        if actor_id.trim().is_empty() {
            return Err(AppError::Validation("Actor is required".to_string()));
        }

        let mut tx = self.repo.begin().await?;
        let Some(mut evidence) = db::fetch_evidence(&mut tx, evidence_id).await? else {
            return Ok(None);
        };

        evidence.approved = approved;
        if approved {
            evidence.approved_by = Some(actor_id.to_string());
            evidence.approved_at = Some(Utc::now());
        } else {
            evidence.approved_by = None;
            evidence.approved_at = None;
        }

        if !db::update_evidence_approval(&mut tx, &evidence).await? {
            return Ok(None);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(evidence_id = %evidence.id, approved, "Evidence reviewed");
        Ok(Some(evidence))
    }

    /// Evidence of an activation. Returns `None` when the activation does not exist.
    pub async fn list(
        &self,
        activation_id: &str,
    ) -> Result<Option<Vec<ActivationEvidence>>, AppError> {
        if self.repo.get_activation(activation_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.repo.list_evidence(activation_id).await?))
    }
}
