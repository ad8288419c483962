//! Sponsor activation and evidence persistence.

use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::repository::{
    bool_column, db_time, like_pattern, opt_time_column, time_column, Repository,
};
use crate::errors::AppError;
use crate::models::{
    Activation, ActivationEvidence, ActivationFilter, ActivationStatus, EvidenceKind,
};

const ACTIVATION_COLUMNS: &str = "id, sponsor_id, event_id, activity_id, name, description, location, status, scheduled_date, priority, responsible_id, approved_by, completed_at, created_at, updated_at";

const EVIDENCE_COLUMNS: &str = "id, activation_id, file_reference, kind, notes, approved, approved_by, approved_at, uploaded_by, uploaded_at";

impl Repository {
    // ==================== ACTIVATION OPERATIONS ====================

    /// List activations in schedule order.
    pub async fn list_activations(
        &self,
        filter: &ActivationFilter,
    ) -> Result<Vec<Activation>, AppError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM activations WHERE 1 = 1",
            ACTIVATION_COLUMNS
        ));

        if let Some(event_id) = &filter.event_id {
            query.push(" AND event_id = ").push_bind(event_id.clone());
        }
        if let Some(sponsor_id) = &filter.sponsor_id {
            query.push(" AND sponsor_id = ").push_bind(sponsor_id.clone());
        }
        if let Some(responsible_id) = &filter.responsible_id {
            query
                .push(" AND responsible_id = ")
                .push_bind(responsible_id.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = &filter.from {
            query.push(" AND scheduled_date >= ").push_bind(db_time(from));
        }
        if let Some(to) = &filter.to {
            query.push(" AND scheduled_date <= ").push_bind(db_time(to));
        }
        if let Some(text) = filter.search_text.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = like_pattern(text);
            query
                .push(" AND (LOWER(name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(description, '')) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(location, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY scheduled_date, priority DESC");

        let rows = query.build().fetch_all(self.pool()).await?;
        rows.iter().map(activation_from_row).collect()
    }

    pub async fn get_activation(&self, id: &str) -> Result<Option<Activation>, AppError> {
        let mut conn = self.pool().acquire().await?;
        fetch_activation(&mut conn, id).await
    }

    // ==================== EVIDENCE OPERATIONS ====================

    /// Evidence of one activation in upload order.
    pub async fn list_evidence(
        &self,
        activation_id: &str,
    ) -> Result<Vec<ActivationEvidence>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM activation_evidence WHERE activation_id = ? ORDER BY uploaded_at, rowid",
            EVIDENCE_COLUMNS
        ))
        .bind(activation_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(evidence_from_row).collect()
    }

    pub async fn get_evidence(&self, id: &str) -> Result<Option<ActivationEvidence>, AppError> {
        let mut conn = self.pool().acquire().await?;
        fetch_evidence(&mut conn, id).await
    }

    /// Evidence count per activation id. Ids without evidence map to zero.
    pub async fn evidence_counts(
        &self,
        activation_ids: &[String],
    ) -> Result<BTreeMap<String, i64>, AppError> {
        let mut counts: BTreeMap<String, i64> =
            activation_ids.iter().map(|id| (id.clone(), 0)).collect();
        if activation_ids.is_empty() {
            return Ok(counts);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT activation_id, COUNT(*) AS evidence_count FROM activation_evidence WHERE activation_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in activation_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(") GROUP BY activation_id");

        for row in query.build().fetch_all(self.pool()).await? {
            let id: String = row.try_get("activation_id")?;
            counts.insert(id, row.try_get("evidence_count")?);
        }
        Ok(counts)
    }

    /// Total number of evidence rows, optionally limited to one event.
    pub async fn count_all_evidence(&self, event_id: Option<&str>) -> Result<i64, AppError> {
        let row = match event_id {
            Some(event_id) => {
                sqlx::query(
                    "SELECT COUNT(*) AS total FROM activation_evidence e JOIN activations a ON a.id = e.activation_id WHERE a.event_id = ?",
                )
                .bind(event_id)
                .fetch_one(self.pool())
                .await?
            }
            None => {
                sqlx::query("SELECT COUNT(*) AS total FROM activation_evidence")
                    .fetch_one(self.pool())
                    .await?
            }
        };
        Ok(row.try_get("total")?)
    }
}

pub async fn fetch_activation(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Activation>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM activations WHERE id = ?",
        ACTIVATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(activation_from_row).transpose()
}

pub async fn insert_activation(
    conn: &mut SqliteConnection,
    activation: &Activation,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO activations (
            id, sponsor_id, event_id, activity_id, name, description, location, status,
            scheduled_date, priority, responsible_id, approved_by, completed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&activation.id)
    .bind(&activation.sponsor_id)
    .bind(&activation.event_id)
    .bind(&activation.activity_id)
    .bind(&activation.name)
    .bind(&activation.description)
    .bind(&activation.location)
    .bind(activation.status.as_str())
    .bind(db_time(&activation.scheduled_date))
    .bind(activation.priority)
    .bind(&activation.responsible_id)
    .bind(&activation.approved_by)
    .bind(activation.completed_at.as_ref().map(db_time))
    .bind(db_time(&activation.created_at))
    .bind(db_time(&activation.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Overwrite every mutable column. Returns false when the row is gone.
pub async fn update_activation(
    conn: &mut SqliteConnection,
    activation: &Activation,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"UPDATE activations SET
            sponsor_id = ?, event_id = ?, activity_id = ?, name = ?, description = ?,
            location = ?, status = ?, scheduled_date = ?, priority = ?, responsible_id = ?,
            approved_by = ?, completed_at = ?, updated_at = ?
        WHERE id = ?"#,
    )
    .bind(&activation.sponsor_id)
    .bind(&activation.event_id)
    .bind(&activation.activity_id)
    .bind(&activation.name)
    .bind(&activation.description)
    .bind(&activation.location)
    .bind(activation.status.as_str())
    .bind(db_time(&activation.scheduled_date))
    .bind(activation.priority)
    .bind(&activation.responsible_id)
    .bind(&activation.approved_by)
    .bind(activation.completed_at.as_ref().map(db_time))
    .bind(db_time(&activation.updated_at))
    .bind(&activation.id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete an activation and its evidence.
pub async fn delete_activation(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    sqlx::query("DELETE FROM activation_evidence WHERE activation_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query("DELETE FROM activations WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_evidence(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<ActivationEvidence>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM activation_evidence WHERE id = ?",
        EVIDENCE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(evidence_from_row).transpose()
}

pub async fn count_evidence(
    conn: &mut SqliteConnection,
    activation_id: &str,
) -> Result<i64, AppError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS evidence_count FROM activation_evidence WHERE activation_id = ?",
    )
    .bind(activation_id)
    .fetch_one(conn)
    .await?;
    Ok(row.try_get("evidence_count")?)
}

pub async fn insert_evidence(
    conn: &mut SqliteConnection,
    evidence: &ActivationEvidence,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO activation_evidence (id, activation_id, file_reference, kind, notes, approved, approved_by, approved_at, uploaded_by, uploaded_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&evidence.id)
    .bind(&evidence.activation_id)
    .bind(&evidence.file_reference)
    .bind(evidence.kind.as_str())
    .bind(&evidence.notes)
    .bind(evidence.approved as i32)
    .bind(&evidence.approved_by)
    .bind(evidence.approved_at.as_ref().map(db_time))
    .bind(&evidence.uploaded_by)
    .bind(db_time(&evidence.uploaded_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_evidence_approval(
    conn: &mut SqliteConnection,
    evidence: &ActivationEvidence,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE activation_evidence SET approved = ?, approved_by = ?, approved_at = ? WHERE id = ?",
    )
    .bind(evidence.approved as i32)
    .bind(&evidence.approved_by)
    .bind(evidence.approved_at.as_ref().map(db_time))
    .bind(&evidence.id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_evidence(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM activation_evidence WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn activation_from_row(row: &SqliteRow) -> Result<Activation, AppError> {
    let status: String = row.try_get("status")?;
    Ok(Activation {
        id: row.try_get("id")?,
        sponsor_id: row.try_get("sponsor_id")?,
        event_id: row.try_get("event_id")?,
        activity_id: row.try_get("activity_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        status: ActivationStatus::parse(&status)
            .ok_or_else(|| AppError::Internal(format!("Unknown activation status '{}'", status)))?,
        scheduled_date: time_column(row, "scheduled_date")?,
        priority: row.try_get("priority")?,
        responsible_id: row.try_get("responsible_id")?,
        approved_by: row.try_get("approved_by")?,
        completed_at: opt_time_column(row, "completed_at")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn evidence_from_row(row: &SqliteRow) -> Result<ActivationEvidence, AppError> {
    let kind: String = row.try_get("kind")?;
    Ok(ActivationEvidence {
        id: row.try_get("id")?,
        activation_id: row.try_get("activation_id")?,
        file_reference: row.try_get("file_reference")?,
        kind: EvidenceKind::parse(&kind).unwrap_or(EvidenceKind::Other),
        notes: row.try_get("notes")?,
        approved: bool_column(row, "approved")?,
        approved_by: row.try_get("approved_by")?,
        approved_at: opt_time_column(row, "approved_at")?,
        uploaded_by: row.try_get("uploaded_by")?,
        uploaded_at: time_column(row, "uploaded_at")?,
    })
}
