//! Test utilities for viva-server integration tests

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use viva_common::message::JobMessage;
use viva_common::{Error, Result};
use viva_server::db;
use viva_server::producer::JobPublisher;

/// Create temporary test database with tables applied.
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for the
/// duration of the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let db_path = temp_dir.path().join("viva_test.db");
    let pool = db::init_database_pool(&db_path)
        .await
        .expect("init test database");
    (temp_dir, pool)
}

/// Seed a submission row
pub async fn seed_submission(pool: &SqlitePool, id: &str, extracted_text: Option<&str>) {
    let submission = db::submissions::Submission::new(id, extracted_text.map(String::from));
    db::submissions::save_submission(pool, &submission)
        .await
        .expect("seed submission");
}

/// Seed a rubric row
pub async fn seed_rubric(pool: &SqlitePool, id: &str, title: &str) {
    let rubric = db::rubrics::Rubric::new(id, title);
    db::rubrics::save_rubric(pool, &rubric)
        .await
        .expect("seed rubric");
}

/// Recording job publisher; optionally fails every publish
#[derive(Default)]
pub struct FakePublisher {
    pub published: Mutex<Vec<JobMessage>>,
    pub fail: AtomicBool,
}

impl FakePublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn last_published(&self) -> Option<JobMessage> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl JobPublisher for FakePublisher {
    async fn publish_job(&self, message: &JobMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Internal("publish failed".to_string()));
        }
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}
