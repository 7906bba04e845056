//! Submission row operations

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use viva_common::{Error, Result};

use super::VivaStatus;

/// A student submission as the pipeline sees it.
///
/// CRUD ownership of these rows lives outside the pipeline; the producer
/// reads them and both producer and dispatcher mutate `viva_status`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub viva_status: VivaStatus,
    /// Text extracted from the submitted document, if extraction has run
    pub extracted_text: Option<String>,
    /// Optional user-supplied prompt addition for question generation
    pub custom_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(id: impl Into<String>, extracted_text: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            viva_status: VivaStatus::Pending,
            extracted_text,
            custom_prompt: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Insert or update a submission row
pub async fn save_submission(pool: &SqlitePool, submission: &Submission) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO submissions (id, viva_status, extracted_text, custom_prompt, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            viva_status = excluded.viva_status,
            extracted_text = excluded.extracted_text,
            custom_prompt = excluded.custom_prompt,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&submission.id)
    .bind(submission.viva_status.as_str())
    .bind(&submission.extracted_text)
    .bind(&submission.custom_prompt)
    .bind(submission.created_at.to_rfc3339())
    .bind(submission.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a submission by id
pub async fn get_submission(pool: &SqlitePool, id: &str) -> Result<Option<Submission>> {
    let row = sqlx::query(
        r#"
        SELECT id, viva_status, extracted_text, custom_prompt, created_at, updated_at
        FROM submissions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let status: String = row.get("viva_status");
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");

            Ok(Some(Submission {
                id: row.get("id"),
                viva_status: VivaStatus::parse(&status)?,
                extracted_text: row.get("extracted_text"),
                custom_prompt: row.get("custom_prompt"),
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Update the viva-generation status of a submission
pub async fn set_viva_status(pool: &SqlitePool, id: &str, status: VivaStatus) -> Result<()> {
    sqlx::query("UPDATE submissions SET viva_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Current viva-generation status of a submission
pub async fn get_viva_status(pool: &SqlitePool, id: &str) -> Result<Option<VivaStatus>> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT viva_status FROM submissions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    status.as_deref().map(VivaStatus::parse).transpose()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))
}
