//! Delivery and comment persistence.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::repository::{
    bool_column, db_time, like_pattern, opt_time_column, time_column, Repository,
};
use crate::errors::AppError;
use crate::models::{Delivery, DeliveryComment, DeliveryFilter, DeliveryStatus};

const DELIVERY_COLUMNS: &str = "id, title, description, deadline, format_specs, responsible_id, activity_id, event_id, priority, status, progress, created_by, created_at, updated_at, published_at";

const COMMENT_COLUMNS: &str = "id, delivery_id, user_id, text, timecode, timestamp, is_system";

impl Repository {
    // ==================== DELIVERY OPERATIONS ====================

    /// List deliveries, most urgent first.
    pub async fn list_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<Delivery>, AppError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM deliveries WHERE 1 = 1", DELIVERY_COLUMNS));

        if let Some(event_id) = &filter.event_id {
            query.push(" AND event_id = ").push_bind(event_id.clone());
        }
        if let Some(responsible_id) = &filter.responsible_id {
            query
                .push(" AND responsible_id = ")
                .push_bind(responsible_id.clone());
        }
        if let Some(activity_id) = &filter.activity_id {
            query.push(" AND activity_id = ").push_bind(activity_id.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            query.push(" AND priority = ").push_bind(priority);
        }
        if let Some(text) = filter.search_text.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = like_pattern(text);
            query
                .push(" AND (LOWER(title) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(description, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY priority DESC, deadline");

        let rows = query.build().fetch_all(self.pool()).await?;
        rows.iter().map(delivery_from_row).collect()
    }

    pub async fn get_delivery(&self, id: &str) -> Result<Option<Delivery>, AppError> {
        let mut conn = self.pool().acquire().await?;
        fetch_delivery(&mut conn, id).await
    }

    /// Open deliveries whose deadline has passed, oldest deadline first.
    pub async fn list_late_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Delivery>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deliveries WHERE deadline < ? AND status IN (?, ?, ?) ORDER BY deadline",
            DELIVERY_COLUMNS
        ))
        .bind(db_time(&now))
        .bind(DeliveryStatus::Pending.as_str())
        .bind(DeliveryStatus::InProgress.as_str())
        .bind(DeliveryStatus::Review.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// Open deliveries due in `[now, until]`.
    pub async fn list_deliveries_due_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Delivery>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deliveries WHERE deadline >= ? AND deadline <= ? AND status IN (?, ?, ?) ORDER BY deadline",
            DELIVERY_COLUMNS
        ))
        .bind(db_time(&now))
        .bind(db_time(&until))
        .bind(DeliveryStatus::Pending.as_str())
        .bind(DeliveryStatus::InProgress.as_str())
        .bind(DeliveryStatus::Review.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// Comments of a delivery in chronological order, or newest first.
    pub async fn list_comments(
        &self,
        delivery_id: &str,
        newest_first: bool,
    ) -> Result<Vec<DeliveryComment>, AppError> {
        let order = if newest_first { "DESC" } else { "ASC" };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM delivery_comments WHERE delivery_id = ? ORDER BY timestamp {}, rowid {}",
            COMMENT_COLUMNS, order, order
        ))
        .bind(delivery_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(comment_from_row).collect()
    }
}

pub async fn fetch_delivery(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Delivery>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM deliveries WHERE id = ?",
        DELIVERY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(delivery_from_row).transpose()
}

pub async fn insert_delivery(
    conn: &mut SqliteConnection,
    delivery: &Delivery,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO deliveries (
            id, title, description, deadline, format_specs, responsible_id, activity_id,
            event_id, priority, status, progress, created_by, created_at, updated_at, published_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&delivery.id)
    .bind(&delivery.title)
    .bind(&delivery.description)
    .bind(db_time(&delivery.deadline))
    .bind(&delivery.format_specs)
    .bind(&delivery.responsible_id)
    .bind(&delivery.activity_id)
    .bind(&delivery.event_id)
    .bind(delivery.priority)
    .bind(delivery.status.as_str())
    .bind(delivery.progress)
    .bind(&delivery.created_by)
    .bind(db_time(&delivery.created_at))
    .bind(db_time(&delivery.updated_at))
    .bind(delivery.published_at.as_ref().map(db_time))
    .execute(conn)
    .await?;
    Ok(())
}

/// Overwrite every mutable column. Returns false when the row is gone.
pub async fn update_delivery(
    conn: &mut SqliteConnection,
    delivery: &Delivery,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"UPDATE deliveries SET
            title = ?, description = ?, deadline = ?, format_specs = ?, responsible_id = ?,
            activity_id = ?, event_id = ?, priority = ?, status = ?, progress = ?,
            updated_at = ?, published_at = ?
        WHERE id = ?"#,
    )
    .bind(&delivery.title)
    .bind(&delivery.description)
    .bind(db_time(&delivery.deadline))
    .bind(&delivery.format_specs)
    .bind(&delivery.responsible_id)
    .bind(&delivery.activity_id)
    .bind(&delivery.event_id)
    .bind(delivery.priority)
    .bind(delivery.status.as_str())
    .bind(delivery.progress)
    .bind(db_time(&delivery.updated_at))
    .bind(delivery.published_at.as_ref().map(db_time))
    .bind(&delivery.id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a delivery; its comments go with it.
pub async fn delete_delivery(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM deliveries WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_comment(
    conn: &mut SqliteConnection,
    comment: &DeliveryComment,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO delivery_comments (id, delivery_id, user_id, text, timecode, timestamp, is_system) VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&comment.id)
    .bind(&comment.delivery_id)
    .bind(&comment.user_id)
    .bind(&comment.text)
    .bind(&comment.timecode)
    .bind(db_time(&comment.timestamp))
    .bind(comment.is_system as i32)
    .execute(conn)
    .await?;
    Ok(())
}

fn delivery_from_row(row: &SqliteRow) -> Result<Delivery, AppError> {
    let status: String = row.try_get("status")?;
    Ok(Delivery {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        deadline: time_column(row, "deadline")?,
        format_specs: row.try_get("format_specs")?,
        responsible_id: row.try_get("responsible_id")?,
        activity_id: row.try_get("activity_id")?,
        event_id: row.try_get("event_id")?,
        priority: row.try_get("priority")?,
        status: DeliveryStatus::parse(&status)
            .ok_or_else(|| AppError::Internal(format!("Unknown delivery status '{}'", status)))?,
        progress: row.try_get("progress")?,
        created_by: row.try_get("created_by")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
        published_at: opt_time_column(row, "published_at")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<DeliveryComment, AppError> {
    Ok(DeliveryComment {
        id: row.try_get("id")?,
        delivery_id: row.try_get("delivery_id")?,
        user_id: row.try_get("user_id")?,
        text: row.try_get("text")?,
        timecode: row.try_get("timecode")?,
        timestamp: time_column(row, "timestamp")?,
        is_system: bool_column(row, "is_system")?,
    })
}
