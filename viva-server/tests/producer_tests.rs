//! Producer integration tests: submit-path status transitions, publish
//! contract, and duplicate-enqueue protection.

mod helpers;

use std::sync::Arc;
use viva_common::message::{JobPayload, RubricRequest};
use viva_common::Error;
use viva_server::db::{self, VivaStatus};
use viva_server::producer::Producer;

use helpers::{create_test_db, seed_rubric, seed_submission, FakePublisher};

fn rubric_request(id: &str) -> RubricRequest {
    RubricRequest {
        id: id.to_string(),
        title: "Essay rubric".to_string(),
        created_by_id: "user-1".to_string(),
        assignment_id: "assign-1".to_string(),
        assessment_task: "Argumentative essay".to_string(),
        criteria: vec!["Argument quality".to_string(), "Evidence".to_string()],
        keywords: vec!["thesis".to_string()],
        learning_objectives: vec!["Construct an argument".to_string()],
        existing_guide: String::new(),
    }
}

#[tokio::test]
async fn submit_publishes_job_and_sets_in_progress() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_submission(&pool, "sub-1", Some("Hello world")).await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    producer.submit_submission("sub-1").await.unwrap();

    let message = publisher.last_published().expect("job published");
    assert_eq!(message.uuid, "sub-1");
    match message.payload {
        JobPayload::VivaQuestions(job) => {
            assert_eq!(job.submission, "Hello world");
            assert_eq!(job.custom_prompt, None);
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    let status = db::submissions::get_viva_status(&pool, "sub-1").await.unwrap();
    assert_eq!(status, Some(VivaStatus::InProgress));
}

#[tokio::test]
async fn submit_unknown_submission_fails_without_publishing() {
    let (_temp_dir, pool) = create_test_db().await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    let err = producer.submit_submission("missing-id").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(publisher.published_count(), 0);
}

#[tokio::test]
async fn submit_without_extracted_text_sets_error() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_submission(&pool, "sub-empty", None).await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    let err = producer.submit_submission("sub-empty").await.unwrap_err();
    assert!(matches!(err, Error::MissingContent(_)));
    assert_eq!(publisher.published_count(), 0);

    let status = db::submissions::get_viva_status(&pool, "sub-empty").await.unwrap();
    assert_eq!(status, Some(VivaStatus::Error));
}

#[tokio::test]
async fn submit_whitespace_text_counts_as_missing() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_submission(&pool, "sub-ws", Some("   \n  ")).await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    let err = producer.submit_submission("sub-ws").await.unwrap_err();
    assert!(matches!(err, Error::MissingContent(_)));
}

#[tokio::test]
async fn second_submit_while_in_progress_is_rejected() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_submission(&pool, "sub-1", Some("Hello world")).await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    producer.submit_submission("sub-1").await.unwrap();
    let err = producer.submit_submission("sub-1").await.unwrap_err();

    assert!(matches!(err, Error::Conflict(_)));
    // No second job was published and the in-flight status is untouched
    assert_eq!(publisher.published_count(), 1);
    let status = db::submissions::get_viva_status(&pool, "sub-1").await.unwrap();
    assert_eq!(status, Some(VivaStatus::InProgress));
}

#[tokio::test]
async fn publish_failure_sets_error_status() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_submission(&pool, "sub-1", Some("Hello world")).await;

    let publisher = Arc::new(FakePublisher::failing());
    let producer = Producer::new(pool.clone(), publisher.clone());

    assert!(producer.submit_submission("sub-1").await.is_err());

    let status = db::submissions::get_viva_status(&pool, "sub-1").await.unwrap();
    assert_eq!(status, Some(VivaStatus::Error));
}

#[tokio::test]
async fn resubmit_allowed_after_error() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_submission(&pool, "sub-1", Some("Hello world")).await;

    let failing = Arc::new(FakePublisher::failing());
    let producer = Producer::new(pool.clone(), failing.clone());
    assert!(producer.submit_submission("sub-1").await.is_err());

    // Caller-initiated re-submit succeeds once the publisher recovers
    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());
    producer.submit_submission("sub-1").await.unwrap();

    let status = db::submissions::get_viva_status(&pool, "sub-1").await.unwrap();
    assert_eq!(status, Some(VivaStatus::InProgress));
}

#[tokio::test]
async fn submit_rubric_publishes_with_rubric_id_as_uuid() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_rubric(&pool, "rub-1", "Essay rubric").await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    producer.submit_rubric(rubric_request("rub-1")).await.unwrap();

    let message = publisher.last_published().expect("job published");
    assert_eq!(message.uuid, "rub-1");
    assert!(matches!(message.payload, JobPayload::CreateRubric(_)));

    let rubric = db::rubrics::get_rubric(&pool, "rub-1").await.unwrap().unwrap();
    assert_eq!(rubric.status, VivaStatus::InProgress);
}

#[tokio::test]
async fn submit_rubric_unknown_id_fails() {
    let (_temp_dir, pool) = create_test_db().await;

    let publisher = Arc::new(FakePublisher::default());
    let producer = Producer::new(pool.clone(), publisher.clone());

    let err = producer.submit_rubric(rubric_request("rub-x")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(publisher.published_count(), 0);
}

#[tokio::test]
async fn submit_rubric_publish_failure_sets_error() {
    let (_temp_dir, pool) = create_test_db().await;
    seed_rubric(&pool, "rub-1", "Essay rubric").await;

    let publisher = Arc::new(FakePublisher::failing());
    let producer = Producer::new(pool.clone(), publisher.clone());

    assert!(producer.submit_rubric(rubric_request("rub-1")).await.is_err());

    let rubric = db::rubrics::get_rubric(&pool, "rub-1").await.unwrap().unwrap();
    assert_eq!(rubric.status, VivaStatus::Error);
}
