//! Rubric row operations

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use viva_common::message::RubricBody;
use viva_common::{Error, Result};

use super::VivaStatus;

/// A marking rubric as the pipeline sees it
#[derive(Debug, Clone)]
pub struct Rubric {
    pub id: String,
    pub title: String,
    pub status: VivaStatus,
    /// Generated rubric structure, present once generation completed
    pub body: Option<RubricBody>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rubric {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            status: VivaStatus::Pending,
            body: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Insert a rubric row, or refresh its title if it already exists.
///
/// The existing status is preserved on conflict so a re-trigger cannot
/// clobber an in-flight generation.
pub async fn save_rubric(pool: &SqlitePool, rubric: &Rubric) -> Result<()> {
    let body = rubric
        .body
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO rubrics (id, title, status, body, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&rubric.id)
    .bind(&rubric.title)
    .bind(rubric.status.as_str())
    .bind(&body)
    .bind(rubric.created_at.to_rfc3339())
    .bind(rubric.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a rubric by id
pub async fn get_rubric(pool: &SqlitePool, id: &str) -> Result<Option<Rubric>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, status, body, created_at, updated_at
        FROM rubrics
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let status: String = row.get("status");
            let body: Option<String> = row.get("body");
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");

            Ok(Some(Rubric {
                id: row.get("id"),
                title: row.get("title"),
                status: VivaStatus::parse(&status)?,
                body: body
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .map_err(|e| Error::Internal(format!("Invalid rubric body JSON: {}", e)))?,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Update the generation status of a rubric
pub async fn set_rubric_status(pool: &SqlitePool, id: &str, status: VivaStatus) -> Result<()> {
    sqlx::query("UPDATE rubrics SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Persist a generated rubric body and mark the rubric COMPLETE.
///
/// One transaction, so a redelivered result overwrites rather than
/// duplicates.
pub async fn complete_rubric(pool: &SqlitePool, id: &str, body: &RubricBody) -> Result<()> {
    let body_json = serde_json::to_string(body)?;
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE rubrics SET body = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(&body_json)
        .bind(VivaStatus::Complete.as_str())
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))
}
