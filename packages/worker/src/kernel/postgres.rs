// Postgres-backed implementations of the store traits.
//
// Thin adapters over the model methods so the generation domain can be
// exercised against in-memory stores in tests.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BaseCatalog, BaseJobStore, BaseNotificationStore, BaseQuestionStore};
use crate::domains::generation::models::{
    taxonomy, GenerationJob, JobProgress, NewNotification, NewQuestion, Partition, SourceDocument,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseJobStore for PostgresStore {
    async fn find_pending(&self, partition: Partition, limit: i64) -> Result<Vec<GenerationJob>> {
        GenerationJob::find_pending(partition, limit, &self.pool).await
    }

    async fn claim(&self, job_id: Uuid) -> Result<bool> {
        GenerationJob::claim(job_id, &self.pool).await
    }

    async fn record_progress(&self, job_id: Uuid, progress: &JobProgress) -> Result<()> {
        GenerationJob::record_progress(job_id, progress, &self.pool).await
    }

    async fn mark_completed(&self, job_id: Uuid, progress: &JobProgress) -> Result<bool> {
        GenerationJob::mark_completed(job_id, progress, &self.pool).await
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<bool> {
        GenerationJob::mark_failed(job_id, error, &self.pool).await
    }
}

#[async_trait]
impl BaseQuestionStore for PostgresStore {
    async fn insert(&self, question: &NewQuestion) -> Result<Uuid> {
        question.insert(&self.pool).await
    }
}

#[async_trait]
impl BaseNotificationStore for PostgresStore {
    async fn insert(&self, notification: &NewNotification) -> Result<Uuid> {
        notification.insert(&self.pool).await
    }
}

#[async_trait]
impl BaseCatalog for PostgresStore {
    async fn subject_name(&self, subject_id: Uuid) -> Result<Option<String>> {
        taxonomy::find_subject_name(subject_id, &self.pool).await
    }

    async fn topic_name(&self, topic_id: Uuid) -> Result<Option<String>> {
        taxonomy::find_topic_name(topic_id, &self.pool).await
    }

    async fn source_document(&self, document_id: Uuid) -> Result<Option<SourceDocument>> {
        SourceDocument::find_by_id(document_id, &self.pool).await
    }
}
