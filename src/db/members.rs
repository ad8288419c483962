//! Team member persistence.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::repository::{bump_revision, db_time, like_pattern, time_column, Repository};
use crate::errors::AppError;
use crate::models::{CreateMemberRequest, MemberFilter, TeamMember, UpdateMemberRequest};

const MEMBER_COLUMNS: &str =
    "id, user_id, name, role, skills, contact_info, equipment, hourly_rate, updated_at, version";

impl Repository {
    // ==================== MEMBER OPERATIONS ====================

    /// List members ordered by name.
    pub async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<TeamMember>, AppError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM team_members WHERE 1 = 1", MEMBER_COLUMNS));

        if let Some(role) = filter.role.as_deref().filter(|r| !r.trim().is_empty()) {
            query.push(" AND role = ").push_bind(role.to_string());
        }
        if let Some(text) = filter.search_text.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = like_pattern(text);
            query
                .push(" AND (LOWER(name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(skills, '')) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(contact_info, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY name");

        let rows = query.build().fetch_all(self.pool()).await?;
        rows.iter().map(member_from_row).collect()
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Option<TeamMember>, AppError> {
        let mut conn = self.pool().acquire().await?;
        fetch_member(&mut conn, id).await
    }

    /// Create a new member.
    pub async fn create_member(
        &self,
        request: &CreateMemberRequest,
    ) -> Result<TeamMember, AppError> {
        let member = TeamMember {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            name: request.name.trim().to_string(),
            role: request.role.trim().to_string(),
            skills: request.skills.clone(),
            contact_info: request.contact_info.clone(),
            equipment: request.equipment.clone(),
            hourly_rate: request.hourly_rate,
            updated_at: Utc::now(),
            version: 1,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO team_members (id, user_id, name, role, skills, contact_info, equipment, hourly_rate, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&member.id)
        .bind(&member.user_id)
        .bind(&member.name)
        .bind(&member.role)
        .bind(&member.skills)
        .bind(&member.contact_info)
        .bind(&member.equipment)
        .bind(member.hourly_rate)
        .bind(db_time(&member.updated_at))
        .execute(&mut *tx)
        .await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(member)
    }

    /// Update a member with optimistic concurrency control.
    ///
    /// Returns `None` when the member does not exist.
    pub async fn update_member(
        &self,
        id: &str,
        request: &UpdateMemberRequest,
    ) -> Result<Option<TeamMember>, AppError> {
        let mut tx = self.begin().await?;
        let Some(existing) = fetch_member(&mut tx, id).await? else {
            return Ok(None);
        };

        // Check version for optimistic concurrency
        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let updated = TeamMember {
            id: existing.id.clone(),
            user_id: request.user_id.clone().or(existing.user_id),
            name: request
                .name
                .as_deref()
                .map(|n| n.trim().to_string())
                .unwrap_or(existing.name),
            role: request
                .role
                .as_deref()
                .map(|r| r.trim().to_string())
                .unwrap_or(existing.role),
            skills: request.skills.clone().or(existing.skills),
            contact_info: request.contact_info.clone().or(existing.contact_info),
            equipment: request.equipment.clone().or(existing.equipment),
            hourly_rate: request.hourly_rate.or(existing.hourly_rate),
            updated_at: Utc::now(),
            version: existing.version + 1,
        };

        let result = sqlx::query(
            "UPDATE team_members SET user_id = ?, name = ?, role = ?, skills = ?, contact_info = ?, equipment = ?, hourly_rate = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&updated.user_id)
        .bind(&updated.name)
        .bind(&updated.role)
        .bind(&updated.skills)
        .bind(&updated.contact_info)
        .bind(&updated.equipment)
        .bind(updated.hourly_rate)
        .bind(db_time(&updated.updated_at))
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: existing.version,
            });
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    /// Delete a member together with their assignments.
    pub async fn delete_member(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM team_members WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }
}

pub async fn fetch_member(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<TeamMember>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM team_members WHERE id = ?",
        MEMBER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(member_from_row).transpose()
}

/// Members matching an optional role, ordered by name.
pub async fn fetch_members_by_role(
    conn: &mut SqliteConnection,
    role: Option<&str>,
) -> Result<Vec<TeamMember>, AppError> {
    let rows = match role {
        Some(role) => {
            sqlx::query(&format!(
                "SELECT {} FROM team_members WHERE role = ? ORDER BY name",
                MEMBER_COLUMNS
            ))
            .bind(role)
            .fetch_all(conn)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM team_members ORDER BY name",
                MEMBER_COLUMNS
            ))
            .fetch_all(conn)
            .await?
        }
    };

    rows.iter().map(member_from_row).collect()
}

fn member_from_row(row: &SqliteRow) -> Result<TeamMember, AppError> {
    Ok(TeamMember {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        skills: row.try_get("skills")?,
        contact_info: row.try_get("contact_info")?,
        equipment: row.try_get("equipment")?,
        hourly_rate: row.try_get("hourly_rate")?,
        updated_at: time_column(row, "updated_at")?,
        version: row.try_get("version")?,
    })
}
