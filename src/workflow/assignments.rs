//! Crew booking service.
//!
//! Keeps the schedule free of double bookings: every create or update re-checks the member's
//! open bookings inside the write transaction and refuses to commit a collision.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::conflicts::{audit_conflicts, find_conflicts};
use crate::db::{self, Repository};
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::{
    AssignmentFilter, ConflictCheckRequest, ConflictPair, CreateAssignmentRequest,
    MemberSchedule, TeamAssignment, TeamMember, UpdateAssignmentRequest,
};

/// Result of a create or update that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Saved(TeamAssignment),
    /// Nothing was written; `proposed` is the record that would have been stored.
    Conflicted {
        proposed: TeamAssignment,
        conflicts: Vec<TeamAssignment>,
    },
}

#[derive(Clone)]
pub struct AssignmentService {
    repo: Arc<Repository>,
    events: EventBus,
}

impl AssignmentService {
    pub fn new(repo: Arc<Repository>, events: EventBus) -> Self {
        Self { repo, events }
    }

    /// Dry-run conflict query against the stored schedule.
    pub async fn check(
        &self,
        request: &ConflictCheckRequest,
    ) -> Result<Vec<TeamAssignment>, AppError> {
        validate_window(request.start_time, request.end_time)?;
        let mut conn = self.repo.pool().acquire().await?;
        let existing = db::fetch_open_assignments_for_member(&mut conn, &request.member_id).await?;
        Ok(find_conflicts(
            &existing,
            &request.member_id,
            request.start_time,
            request.end_time,
            request.exclude_id.as_deref(),
        ))
    }

    /// Book a member. Returns `None` when the member does not exist.
    pub async fn create(
        &self,
        request: CreateAssignmentRequest,
    ) -> Result<Option<AssignmentOutcome>, AppError> {
        if request.activity_id.trim().is_empty() {
            return Err(AppError::Validation("Activity is required".to_string()));
        }
        validate_window(request.start_time, request.end_time)?;

        let mut tx = self.repo.begin().await?;
        if db::fetch_member(&mut tx, &request.member_id).await?.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        let proposed = TeamAssignment {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: request.member_id,
            activity_id: request.activity_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status: Default::default(),
            equipment: request.equipment,
            role_details: request.role_details,
            location: request.location,
            created_at: now,
            updated_at: now,
        };

        let existing = db::fetch_open_assignments_for_member(&mut tx, &proposed.member_id).await?;
        let conflicts = find_conflicts(
            &existing,
            &proposed.member_id,
            proposed.start_time,
            proposed.end_time,
            None,
        );
        if !conflicts.is_empty() {
            tx.rollback().await?;
            return Ok(Some(self.conflicted(proposed, conflicts).await));
        }

        db::insert_assignment(&mut tx, &proposed).await?;
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            assignment_id = %proposed.id,
            member_id = %proposed.member_id,
            "Assignment created"
        );
        self.events
            .publish(DomainEvent::AssignmentSaved {
                assignment: proposed.clone(),
            })
            .await;
        Ok(Some(AssignmentOutcome::Saved(proposed)))
    }

    /// Change a booking. Returns `None` when the booking or its new member does not exist.
    pub async fn update(
        &self,
        id: &str,
        changes: UpdateAssignmentRequest,
    ) -> Result<Option<AssignmentOutcome>, AppError> {
        let mut tx = self.repo.begin().await?;
        let Some(existing) = db::fetch_assignment(&mut tx, id).await? else {
            return Ok(None);
        };

        let mut proposed = existing.clone();
        if let Some(member_id) = changes.member_id {
            proposed.member_id = member_id;
        }
        if let Some(activity_id) = changes.activity_id {
            if activity_id.trim().is_empty() {
                return Err(AppError::Validation("Activity is required".to_string()));
            }
            proposed.activity_id = activity_id;
        }
        if let Some(start_time) = changes.start_time {
            proposed.start_time = start_time;
        }
        if let Some(end_time) = changes.end_time {
            proposed.end_time = end_time;
        }
        if let Some(status) = changes.status {
            proposed.status = status;
        }
        if changes.equipment.is_some() {
            proposed.equipment = changes.equipment;
        }
        if changes.role_details.is_some() {
            proposed.role_details = changes.role_details;
        }
        if changes.location.is_some() {
            proposed.location = changes.location;
        }
        proposed.updated_at = Utc::now();
        validate_window(proposed.start_time, proposed.end_time)?;

        if proposed.member_id != existing.member_id
            && db::fetch_member(&mut tx, &proposed.member_id).await?.is_none()
        {
            return Ok(None);
        }

        // A finalized booking never blocks anything, so it needs no check.
        if proposed.is_open() {
            let others =
                db::fetch_open_assignments_for_member(&mut tx, &proposed.member_id).await?;
            let conflicts = find_conflicts(
                &others,
                &proposed.member_id,
                proposed.start_time,
                proposed.end_time,
                Some(&proposed.id),
            );
            if !conflicts.is_empty() {
                tx.rollback().await?;
                return Ok(Some(self.conflicted(proposed, conflicts).await));
            }
        }

        if !db::update_assignment(&mut tx, &proposed).await? {
            return Ok(None);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(assignment_id = %proposed.id, "Assignment updated");
        self.events
            .publish(DomainEvent::AssignmentSaved {
                assignment: proposed.clone(),
            })
            .await;
        Ok(Some(AssignmentOutcome::Saved(proposed)))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.repo.begin().await?;
        let Some(existing) = db::fetch_assignment(&mut tx, id).await? else {
            return Ok(false);
        };
        if !db::delete_assignment(&mut tx, id).await? {
            return Ok(false);
        }
        db::bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(assignment_id = %id, "Assignment deleted");
        self.events
            .publish(DomainEvent::AssignmentDeleted {
                assignment_id: existing.id,
                member_id: existing.member_id,
            })
            .await;
        Ok(true)
    }

    pub async fn get(&self, id: &str) -> Result<Option<TeamAssignment>, AppError> {
        self.repo.get_assignment(id).await
    }

    pub async fn list(&self, filter: &AssignmentFilter) -> Result<Vec<TeamAssignment>, AppError> {
        self.repo.list_assignments(filter).await
    }

    /// Bookings touching `[from, to]`, grouped by member. An empty `member_ids` means everyone.
    pub async fn schedule(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        member_ids: &[String],
    ) -> Result<Vec<MemberSchedule>, AppError> {
        if let (Some(from), Some(to)) = (from, to) {
            validate_window(from, to)?;
        }
        let filter = AssignmentFilter {
            from,
            to,
            ..Default::default()
        };
        let mut conn = self.repo.pool().acquire().await?;
        let assignments = db::fetch_assignments(&mut conn, &filter, member_ids).await?;

        let mut grouped: BTreeMap<String, Vec<TeamAssignment>> = member_ids
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        for assignment in assignments {
            grouped
                .entry(assignment.member_id.clone())
                .or_default()
                .push(assignment);
        }

        Ok(grouped
            .into_iter()
            .map(|(member_id, assignments)| MemberSchedule {
                member_id,
                assignments,
            })
            .collect())
    }

    /// Members without an open booking touching `[from, to]`.
    pub async fn available_members(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        role: Option<&str>,
    ) -> Result<Vec<TeamMember>, AppError> {
        validate_window(from, to)?;
        let mut conn = self.repo.pool().acquire().await?;
        let busy: HashSet<String> = db::fetch_busy_member_ids(&mut conn, &from, &to)
            .await?
            .into_iter()
            .collect();
        let members = db::fetch_members_by_role(&mut conn, role).await?;
        Ok(members
            .into_iter()
            .filter(|member| !busy.contains(&member.id))
            .collect())
    }

    /// Overlapping pairs across the whole schedule.
    pub async fn audit(&self) -> Result<Vec<ConflictPair>, AppError> {
        let assignments = self.repo.list_assignments(&AssignmentFilter::default()).await?;
        let pairs = audit_conflicts(&assignments);
        if !pairs.is_empty() {
            tracing::warn!("Schedule audit found {} overlapping bookings", pairs.len());
        }
        Ok(pairs)
    }

    async fn conflicted(
        &self,
        proposed: TeamAssignment,
        conflicts: Vec<TeamAssignment>,
    ) -> AssignmentOutcome {
        tracing::info!(
            member_id = %proposed.member_id,
            conflicts = conflicts.len(),
            "Assignment refused, schedule conflict"
        );
        self.events
            .publish(DomainEvent::AssignmentConflict {
                assignment: proposed.clone(),
                conflicts: conflicts.clone(),
            })
            .await;
        AssignmentOutcome::Conflicted {
            proposed,
            conflicts,
        }
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::Validation(
            "Start time must not be after end time".to_string(),
        ));
    }
    Ok(())
}
