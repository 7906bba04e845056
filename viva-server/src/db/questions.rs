//! Generated viva question persistence

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use viva_common::message::GeneratedQuestion;
use viva_common::{Error, Result};

use super::VivaStatus;

/// A persisted generated question
#[derive(Debug, Clone)]
pub struct VivaQuestion {
    pub id: Uuid,
    pub submission_id: String,
    pub question_text: String,
    pub created_at: DateTime<Utc>,
}

/// Persist a generated question set and mark the submission COMPLETE.
///
/// Runs in one transaction: any prior question set for the submission is
/// replaced, so redelivery of the same result is an overwrite rather than a
/// duplicate insert.
pub async fn complete_submission(
    pool: &SqlitePool,
    submission_id: &str,
    questions: &[GeneratedQuestion],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM viva_questions WHERE submission_id = ?")
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

    for question in questions {
        sqlx::query(
            r#"
            INSERT INTO viva_questions (id, submission_id, question_text, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(submission_id)
        .bind(&question.question)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE submissions SET viva_status = ?, updated_at = ? WHERE id = ?")
        .bind(VivaStatus::Complete.as_str())
        .bind(&now)
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

/// List persisted questions for a submission
pub async fn list_questions(pool: &SqlitePool, submission_id: &str) -> Result<Vec<VivaQuestion>> {
    let rows = sqlx::query(
        r#"
        SELECT id, submission_id, question_text, created_at
        FROM viva_questions
        WHERE submission_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            let created_at: String = row.get("created_at");

            Ok(VivaQuestion {
                id: Uuid::parse_str(&id)
                    .map_err(|e| Error::Internal(format!("Invalid question id: {}", e)))?,
                submission_id: row.get("submission_id"),
                question_text: row.get("question_text"),
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))?
                    .with_timezone(&Utc),
            })
        })
        .collect()
}
