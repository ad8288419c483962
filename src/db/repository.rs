//! Database repository shared by all record types.
//!
//! Pool-level reads live on [`Repository`]; the `fetch_*`/`insert_*` functions in the sibling
//! modules take a plain connection so workflows can compose them inside one transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::RevisionInfo;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a write transaction. Dropping it without commit rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("revision_id")?)
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.try_get("revision_id")?,
            generated_at: row.try_get("generated_at")?,
        })
    }
}

/// Increment the revision ID as part of the caller's transaction.
pub async fn bump_revision(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let now = db_time(&Utc::now());
    let row = sqlx::query(
        "UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1 RETURNING revision_id",
    )
    .bind(&now)
    .fetch_one(conn)
    .await?;
    Ok(row.try_get("revision_id")?)
}

// Helper functions for column conversion

/// Fixed-width UTC text so string comparison in SQL orders chronologically.
///
/// Nanosecond digits keep the full `DateTime<Utc>` value: a record read back equals the one written.
pub fn db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid stored timestamp '{}': {}", raw, e)))
}

pub(crate) fn time_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, AppError> {
    let raw: String = row.try_get(column)?;
    parse_time(&raw)
}

pub(crate) fn opt_time_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(parse_time).transpose()
}

pub(crate) fn bool_column(row: &SqliteRow, column: &str) -> Result<bool, AppError> {
    let value: i64 = row.try_get(column)?;
    Ok(value != 0)
}

/// `%text%` pattern for case-insensitive LIKE filters.
pub(crate) fn like_pattern(text: &str) -> String {
    format!("%{}%", text.trim().to_lowercase())
}
