//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. Every write that belongs to one
//! workflow step runs inside a single transaction and bumps the revision counter.

mod activations;
mod assignments;
mod deliveries;
mod members;
mod repository;

pub use activations::*;
pub use assignments::*;
pub use deliveries::*;
pub use members::*;
pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    tracing::debug!("Database ready at {}", db_path.display());
    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            skills TEXT,
            contact_info TEXT,
            equipment TEXT,
            hourly_rate REAL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_assignments (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL REFERENCES team_members(id) ON DELETE CASCADE,
            activity_id TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            equipment TEXT,
            role_details TEXT,
            location TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deliveries (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            deadline TEXT NOT NULL,
            format_specs TEXT,
            responsible_id TEXT REFERENCES team_members(id) ON DELETE SET NULL,
            activity_id TEXT,
            event_id TEXT,
            priority INTEGER NOT NULL DEFAULT 3,
            status TEXT NOT NULL DEFAULT 'pending',
            progress REAL NOT NULL DEFAULT 0.0,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            published_at TEXT
        );

        CREATE TABLE IF NOT EXISTS delivery_comments (
            id TEXT PRIMARY KEY,
            delivery_id TEXT NOT NULL REFERENCES deliveries(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            text TEXT NOT NULL,
            timecode TEXT,
            timestamp TEXT NOT NULL,
            is_system INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activations (
            id TEXT PRIMARY KEY,
            sponsor_id TEXT NOT NULL,
            event_id TEXT,
            activity_id TEXT,
            name TEXT NOT NULL,
            description TEXT,
            location TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            scheduled_date TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 2,
            responsible_id TEXT,
            approved_by TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS activation_evidence (
            id TEXT PRIMARY KEY,
            activation_id TEXT NOT NULL REFERENCES activations(id) ON DELETE CASCADE,
            file_reference TEXT NOT NULL,
            kind TEXT NOT NULL,
            notes TEXT,
            approved INTEGER NOT NULL DEFAULT 0,
            approved_by TEXT,
            approved_at TEXT,
            uploaded_by TEXT,
            uploaded_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_members_name ON team_members(name);
        CREATE INDEX IF NOT EXISTS idx_members_role ON team_members(role);
        CREATE INDEX IF NOT EXISTS idx_assignments_member ON team_assignments(member_id, status);
        CREATE INDEX IF NOT EXISTS idx_assignments_window ON team_assignments(start_time, end_time);
        CREATE INDEX IF NOT EXISTS idx_deliveries_status ON deliveries(status);
        CREATE INDEX IF NOT EXISTS idx_deliveries_deadline ON deliveries(deadline);
        CREATE INDEX IF NOT EXISTS idx_comments_delivery ON delivery_comments(delivery_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_activations_status ON activations(status);
        CREATE INDEX IF NOT EXISTS idx_activations_scheduled ON activations(scheduled_date);
        CREATE INDEX IF NOT EXISTS idx_evidence_activation ON activation_evidence(activation_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
