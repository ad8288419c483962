//! Team assignment persistence.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::repository::{db_time, time_column, Repository};
use crate::errors::AppError;
use crate::models::{AssignmentFilter, AssignmentStatus, TeamAssignment};

const ASSIGNMENT_COLUMNS: &str = "id, member_id, activity_id, start_time, end_time, status, equipment, role_details, location, created_at, updated_at";

impl Repository {
    // ==================== ASSIGNMENT OPERATIONS ====================

    pub async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<TeamAssignment>, AppError> {
        let mut conn = self.pool().acquire().await?;
        fetch_assignments(&mut conn, filter, &[]).await
    }

    pub async fn get_assignment(&self, id: &str) -> Result<Option<TeamAssignment>, AppError> {
        let mut conn = self.pool().acquire().await?;
        fetch_assignment(&mut conn, id).await
    }
}

pub async fn fetch_assignment(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<TeamAssignment>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM team_assignments WHERE id = ?",
        ASSIGNMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(assignment_from_row).transpose()
}

/// Assignments matching the filter, optionally restricted to a set of members, in start order.
pub async fn fetch_assignments(
    conn: &mut SqliteConnection,
    filter: &AssignmentFilter,
    member_ids: &[String],
) -> Result<Vec<TeamAssignment>, AppError> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM team_assignments WHERE 1 = 1",
        ASSIGNMENT_COLUMNS
    ));

    if let Some(member_id) = &filter.member_id {
        query.push(" AND member_id = ").push_bind(member_id.clone());
    }
    if !member_ids.is_empty() {
        query.push(" AND member_id IN (");
        let mut ids = query.separated(", ");
        for id in member_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");
    }
    if let Some(activity_id) = &filter.activity_id {
        query.push(" AND activity_id = ").push_bind(activity_id.clone());
    }
    if let Some(from) = &filter.from {
        query.push(" AND end_time >= ").push_bind(db_time(from));
    }
    if let Some(to) = &filter.to {
        query.push(" AND start_time <= ").push_bind(db_time(to));
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    query.push(" ORDER BY start_time, member_id");

    let rows = query.build().fetch_all(conn).await?;
    rows.iter().map(assignment_from_row).collect()
}

/// Non-finalized assignments of one member.
pub async fn fetch_open_assignments_for_member(
    conn: &mut SqliteConnection,
    member_id: &str,
) -> Result<Vec<TeamAssignment>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM team_assignments WHERE member_id = ? AND status != ? ORDER BY start_time",
        ASSIGNMENT_COLUMNS
    ))
    .bind(member_id)
    .bind(AssignmentStatus::Finalized.as_str())
    .fetch_all(conn)
    .await?;

    rows.iter().map(assignment_from_row).collect()
}

/// Ids of members holding a non-finalized assignment touching `[from, to]`.
pub async fn fetch_busy_member_ids(
    conn: &mut SqliteConnection,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query(
        "SELECT DISTINCT member_id FROM team_assignments WHERE status != ? AND start_time <= ? AND end_time >= ?",
    )
    .bind(AssignmentStatus::Finalized.as_str())
    .bind(db_time(to))
    .bind(db_time(from))
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("member_id").map_err(AppError::from))
        .collect()
}

pub async fn insert_assignment(
    conn: &mut SqliteConnection,
    assignment: &TeamAssignment,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO team_assignments (id, member_id, activity_id, start_time, end_time, status, equipment, role_details, location, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&assignment.id)
    .bind(&assignment.member_id)
    .bind(&assignment.activity_id)
    .bind(db_time(&assignment.start_time))
    .bind(db_time(&assignment.end_time))
    .bind(assignment.status.as_str())
    .bind(&assignment.equipment)
    .bind(&assignment.role_details)
    .bind(&assignment.location)
    .bind(db_time(&assignment.created_at))
    .bind(db_time(&assignment.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Overwrite every mutable column. Returns false when the row is gone.
pub async fn update_assignment(
    conn: &mut SqliteConnection,
    assignment: &TeamAssignment,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE team_assignments SET member_id = ?, activity_id = ?, start_time = ?, end_time = ?, status = ?, equipment = ?, role_details = ?, location = ?, updated_at = ? WHERE id = ?"
    )
    .bind(&assignment.member_id)
    .bind(&assignment.activity_id)
    .bind(db_time(&assignment.start_time))
    .bind(db_time(&assignment.end_time))
    .bind(assignment.status.as_str())
    .bind(&assignment.equipment)
    .bind(&assignment.role_details)
    .bind(&assignment.location)
    .bind(db_time(&assignment.updated_at))
    .bind(&assignment.id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_assignment(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM team_assignments WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn assignment_from_row(row: &SqliteRow) -> Result<TeamAssignment, AppError> {
    let status: String = row.try_get("status")?;
    Ok(TeamAssignment {
        id: row.try_get("id")?,
        member_id: row.try_get("member_id")?,
        activity_id: row.try_get("activity_id")?,
        start_time: time_column(row, "start_time")?,
        end_time: time_column(row, "end_time")?,
        status: AssignmentStatus::parse(&status)
            .ok_or_else(|| AppError::Internal(format!("Unknown assignment status '{}'", status)))?,
        equipment: row.try_get("equipment")?,
        role_details: row.try_get("role_details")?,
        location: row.try_get("location")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}
