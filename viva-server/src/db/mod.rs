//! Database access for viva-server
//!
//! The database owns all durable pipeline state: submission and rubric
//! status columns, generated questions, and rubric bodies. Queue messages
//! are transient; only the rows these modules manage survive restarts.

pub mod questions;
pub mod rubrics;
pub mod submissions;

use sqlx::SqlitePool;
use std::path::Path;
use viva_common::{Error, Result};

/// Viva-generation status of a submission or rubric.
///
/// The producer transitions PENDING→INPROGRESS before enqueueing and →ERROR
/// on failure; the dispatcher transitions INPROGRESS→COMPLETE when results
/// persist. The persisted column doubles as the in-flight guard: no second
/// job is enqueued while a row is INPROGRESS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VivaStatus {
    Pending,
    InProgress,
    Complete,
    Error,
}

impl VivaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VivaStatus::Pending => "PENDING",
            VivaStatus::InProgress => "INPROGRESS",
            VivaStatus::Complete => "COMPLETE",
            VivaStatus::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "PENDING" => Ok(VivaStatus::Pending),
            "INPROGRESS" => Ok(VivaStatus::InProgress),
            "COMPLETE" => Ok(VivaStatus::Complete),
            "ERROR" => Ok(VivaStatus::Error),
            other => Err(Error::Internal(format!("Unknown viva status: {}", other))),
        }
    }
}

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create pipeline tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            viva_status TEXT NOT NULL DEFAULT 'PENDING',
            extracted_text TEXT,
            custom_prompt TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS viva_questions (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES submissions(id),
            question_text TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rubrics (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            body TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (submissions, viva_questions, rubrics)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            VivaStatus::Pending,
            VivaStatus::InProgress,
            VivaStatus::Complete,
            VivaStatus::Error,
        ] {
            assert_eq!(VivaStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(VivaStatus::parse("DONE").is_err());
    }
}
