//! Job, question and notification queries against a real Postgres.
//!
//! Needs Docker: `cargo test -- --ignored`.

mod common;

use std::sync::Arc;

use common::*;
use test_context::test_context;
use uuid::Uuid;
use worker_core::domains::generation::models::{
    GenerationJob, JobConfig, JobProgress, JobStatus, Notification, Partition, Question,
    SourceDocument,
};
use worker_core::domains::generation::activities::process_job;
use worker_core::domains::generation::JobOutcome;
use worker_core::kernel::test_dependencies::MockAI;
use worker_core::kernel::{GenerationRateLimiter, WorkerDeps};
use worker_core::GenerationSettings;

async fn insert_job(ctx: &TestHarness, user_email: &str, config: JobConfig, age_secs: i64) -> GenerationJob {
    let mut job = pending_job(config, age_secs);
    job.user_email = user_email.to_string();
    job.insert(&ctx.db_pool).await.unwrap()
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn claim_is_conditional(ctx: &TestHarness) {
    let job = insert_job(ctx, "claim@example.com", plain_config(1), 0).await;

    assert!(GenerationJob::claim(job.id, &ctx.db_pool).await.unwrap());
    assert!(!GenerationJob::claim(job.id, &ctx.db_pool).await.unwrap());

    let claimed = GenerationJob::find_by_id(job.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.status, JobStatus::Processing);
    assert!(claimed.started_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn terminal_updates_require_processing(ctx: &TestHarness) {
    let job = insert_job(ctx, "terminal@example.com", plain_config(2), 0).await;
    let progress = JobProgress::from_ids(&[Uuid::new_v4()], 2);

    // Still pending: nothing applies
    assert!(!GenerationJob::mark_completed(job.id, &progress, &ctx.db_pool).await.unwrap());
    assert!(!GenerationJob::mark_failed(job.id, "x", &ctx.db_pool).await.unwrap());

    GenerationJob::claim(job.id, &ctx.db_pool).await.unwrap();
    assert!(GenerationJob::mark_completed(job.id, &progress, &ctx.db_pool).await.unwrap());
    assert!(!GenerationJob::mark_failed(job.id, "late", &ctx.db_pool).await.unwrap());

    let done = GenerationJob::find_by_id(job.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.questions_generated, 1);
    assert_eq!(done.progress_percentage, 50);
    assert_eq!(done.question_ids, progress.question_ids);
    assert!(done.error_message.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn pending_jobs_split_by_document(ctx: &TestHarness) {
    let user = format!("partition-{}@example.com", Uuid::new_v4());
    let plain = insert_job(ctx, &user, plain_config(1), 3600).await;
    let document = insert_job(
        ctx,
        &user,
        JobConfig {
            source_document_id: Some(Uuid::new_v4()),
            ..plain_config(1)
        },
        3600,
    )
    .await;

    let plain_ids: Vec<Uuid> = GenerationJob::find_pending(Partition::Plain, 1000, &ctx.db_pool)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    let document_ids: Vec<Uuid> = GenerationJob::find_pending(Partition::Document, 1000, &ctx.db_pool)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();

    assert!(plain_ids.contains(&plain.id));
    assert!(!plain_ids.contains(&document.id));
    assert!(document_ids.contains(&document.id));
    assert!(!document_ids.contains(&plain.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn legacy_config_keys_load(ctx: &TestHarness) {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO question_generation_jobs (user_email, config)
        VALUES ('legacy@example.com', '{"total_questions": 4, "pdf_id": "7d1b3f1e-8a51-4f7e-9d6c-1b2a3c4d5e6f"}')
        RETURNING id
        "#,
    )
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();

    let job = GenerationJob::find_by_id(id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    let config = job.job_config().unwrap();
    assert_eq!(config.quantity, 4);
    assert!(config.source_document_id.is_some());
    assert_eq!(job.partition(), Partition::Document);

    // The SQL partition predicate must agree with the typed config
    let document_ids: Vec<Uuid> = GenerationJob::find_pending(Partition::Document, 1000, &ctx.db_pool)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert!(document_ids.contains(&id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn undecodable_config_does_not_break_polling(ctx: &TestHarness) {
    let bad: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO question_generation_jobs (user_email, config, created_at)
        VALUES ('bad-config@example.com', '{"context_id": "c-1", "quantity": -3}', NOW() - INTERVAL '10 years')
        RETURNING id
        "#,
    )
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();
    let good = insert_job(ctx, "good-config@example.com", plain_config(1), 0).await;

    let polled = GenerationJob::find_pending(Partition::Plain, 1000, &ctx.db_pool)
        .await
        .unwrap();
    let bad_job = polled.iter().find(|j| j.id == bad).unwrap();
    assert!(bad_job.job_config().is_err());
    assert!(polled.iter().any(|j| j.id == good.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn processed_job_persists_questions_and_notification(ctx: &TestHarness) {
    let user = format!("process-{}@example.com", Uuid::new_v4());
    let job = insert_job(ctx, &user, plain_config(3), 0).await;

    let ai = Arc::new(MockAI::new());
    ai.push_questions(3);
    let deps = WorkerDeps::postgres(ctx.db_pool.clone(), ai, GenerationRateLimiter::unlimited());

    // Driven directly so jobs left pending by other tests stay untouched
    let outcome = process_job(job.clone(), &GenerationSettings::default(), &deps).await;
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            generated: 3,
            requested: 3
        }
    );

    let done = GenerationJob::find_by_id(job.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.questions_generated, 3);
    assert_eq!(done.progress_percentage, 100);
    assert!(done.completed_at.is_some());

    let questions = Question::find_by_ids(&done.question_ids, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions
        .iter()
        .all(|q| !q.is_public && q.origin == "ai_generated" && q.user_email == user));

    let notifications = Notification::find_for_user(&user, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].message, "3 of 3 questions were generated");
    assert_eq!(notifications[0].metadata["job_id"], done.id.to_string());

    // A second attempt loses the claim and changes nothing
    let again = process_job(job, &GenerationSettings::default(), &deps).await;
    assert_eq!(again, JobOutcome::Skipped);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn source_document_lookup(ctx: &TestHarness) {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO source_documents (user_email, file_name, extracted_text) \
         VALUES ('docs@example.com', 'law.pdf', 'Art. 1') RETURNING id",
    )
    .fetch_one(&ctx.db_pool)
    .await
    .unwrap();

    let document = SourceDocument::find_by_id(id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.file_name, "law.pdf");
    assert_eq!(document.content(), Some("Art. 1"));

    assert!(SourceDocument::find_by_id(Uuid::new_v4(), &ctx.db_pool)
        .await
        .unwrap()
        .is_none());
}
